//! Per-transaction results reported back to the consensus engine.
//!
//! Every transaction in a block yields exactly one [`TransactionResult`],
//! successful or not. The numeric [`ResultCode`] is what the engine records;
//! the encoded result goes in the `data` field of the response.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codec::{self, CodecError};

// ---------------------------------------------------------------------------
// ResultCode
// ---------------------------------------------------------------------------

/// Numeric response codes. `Ok` is zero; everything else is a rejection.
///
/// Values are part of the external contract and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ResultCode {
    Ok = 0,
    InvalidRequest = 1,
    InvalidSignature = 2,
    Internal = 3,
    InsufficientFunds = 4,
    Unauthorized = 5,
    NotFound = 6,
}

impl ResultCode {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            0 => Some(ResultCode::Ok),
            1 => Some(ResultCode::InvalidRequest),
            2 => Some(ResultCode::InvalidSignature),
            3 => Some(ResultCode::Internal),
            4 => Some(ResultCode::InsufficientFunds),
            5 => Some(ResultCode::Unauthorized),
            6 => Some(ResultCode::NotFound),
            _ => None,
        }
    }

    pub fn is_ok(self) -> bool {
        self == ResultCode::Ok
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultCode::Ok => "OK",
            ResultCode::InvalidRequest => "INVALID_REQUEST",
            ResultCode::InvalidSignature => "INVALID_SIGNATURE",
            ResultCode::Internal => "INTERNAL",
            ResultCode::InsufficientFunds => "INSUFFICIENT_FUNDS",
            ResultCode::Unauthorized => "UNAUTHORIZED",
            ResultCode::NotFound => "NOT_FOUND",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// TransactionResult
// ---------------------------------------------------------------------------

/// Echo of the transaction a result belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultHeader {
    /// Upper-case hex SHA-256 of the raw envelope.
    pub tx_hash: String,
    pub block_height: u64,
    pub chain_id: String,
    pub nonce: u64,
}

/// Operation-specific success payload. All current operations succeed with
/// an empty marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyResult {
    KeyValue,
    TokenTransfer,
    CreateAccount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultError {
    pub code: ResultCode,
    pub log: String,
}

/// Exactly one of a body result or an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Success(BodyResult),
    Failure(ResultError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResult {
    /// `None` when the payload never decoded, so there is nothing to echo.
    pub header: Option<ResultHeader>,
    pub outcome: Outcome,
}

impl TransactionResult {
    pub fn success(header: ResultHeader, body: BodyResult) -> Self {
        Self {
            header: Some(header),
            outcome: Outcome::Success(body),
        }
    }

    pub fn failure(header: Option<ResultHeader>, code: ResultCode, log: impl Into<String>) -> Self {
        Self {
            header,
            outcome: Outcome::Failure(ResultError {
                code,
                log: log.into(),
            }),
        }
    }

    pub fn code(&self) -> ResultCode {
        match &self.outcome {
            Outcome::Success(_) => ResultCode::Ok,
            Outcome::Failure(err) => err.code,
        }
    }

    /// Human-readable log line; empty on success.
    pub fn log(&self) -> &str {
        match &self.outcome {
            Outcome::Success(_) => "",
            Outcome::Failure(err) => &err.log,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        codec::decode(bytes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
