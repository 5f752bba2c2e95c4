//! Wire types for transactions.
//!
//! A client submits a [`SignedTransaction`]: the canonical encoding of a
//! [`Transaction`] plus an Ed25519 signature over `SHA-256(payload)`. The
//! envelope keeps the payload as opaque bytes so verification always runs
//! against exactly what was signed.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The signed envelope carried in blocks and mempools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// Canonical encoding of a [`Transaction`].
    pub payload: Vec<u8>,
    /// Ed25519 signature over `SHA-256(payload)`.
    pub signature: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// Metadata common to every transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHeader {
    /// Ed25519 public key of the signer. Empty means "no sender".
    pub sender: Vec<u8>,
    /// Chain the client intended this for. Echoed in results.
    pub chain_id: String,
    /// Client-chosen sequence number. Echoed in results, not enforced.
    pub nonce: u64,
}

/// A decoded transaction: a header and exactly one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub header: TransactionHeader,
    pub body: TransactionBody,
}

/// The closed set of operations a transaction can carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionBody {
    KeyValue(KeyValueOp),
    TokenTransfer(TokenTransferOp),
    CreateAccount(CreateAccountOp),
}

/// Upsert an arbitrary string entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueOp {
    pub key: String,
    pub value: String,
}

/// Move `amount` units from one account to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransferOp {
    pub from: Vec<u8>,
    pub to: Vec<u8>,
    pub amount: u64,
}

/// Register an account with zero balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccountOp {
    pub public_key: Vec<u8>,
}

/// Discriminant of [`TransactionBody`], for logs and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    KeyValue,
    TokenTransfer,
    CreateAccount,
}

impl TransactionBody {
    pub fn kind(&self) -> TransactionKind {
        match self {
            TransactionBody::KeyValue(_) => TransactionKind::KeyValue,
            TransactionBody::TokenTransfer(_) => TransactionKind::TokenTransfer,
            TransactionBody::CreateAccount(_) => TransactionKind::CreateAccount,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransactionKind::KeyValue => "key_value",
            TransactionKind::TokenTransfer => "token_transfer",
            TransactionKind::CreateAccount => "create_account",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
