//! Canonical binary codec.
//!
//! Every byte string that crosses a node boundary or lands on disk goes
//! through here: signed envelopes, transaction payloads, results, ledger
//! records and query values. The encoding is bincode with fixed-width
//! integers, a hard size limit, and trailing bytes rejected, so a given value
//! has exactly one encoding and a given byte string decodes to at most one
//! value.
//!
//! Signatures are still checked against the *received* payload bytes, never
//! a re-encoding. The codec being canonical is a convenience for clients, not
//! something verification relies on.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::config::MAX_TX_SIZE_BYTES;

/// Errors produced while encoding or decoding wire and storage values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
        .with_limit(MAX_TX_SIZE_BYTES as u64)
}

/// Encode a value into its canonical byte representation.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    options()
        .serialize(value)
        .map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode a value from bytes. Fails on truncated input, trailing garbage,
/// unknown enum tags, or length prefixes that exceed the size limit.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    options()
        .deserialize(bytes)
        .map_err(|e| CodecError::Decode(e.to_string()))
}
