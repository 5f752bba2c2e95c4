//! Transaction signing.
//!
//! The signature covers `SHA-256(payload)` where `payload` is the canonical
//! encoding of the transaction. The payload bytes produced here are the ones
//! shipped in the envelope, so the verifier hashes exactly what was signed.

use super::types::{SignedTransaction, Transaction};
use crate::codec::{self, CodecError};
use crate::crypto::{sha256, LedgerKeypair};

/// The message an Ed25519 signature is computed over for a given payload.
pub fn signing_hash(payload: &[u8]) -> [u8; 32] {
    sha256(payload)
}

/// Encode `tx` and sign it with `keypair`.
///
/// The caller is responsible for making `tx.header.sender` match the
/// keypair; a mismatch produces an envelope that fails verification.
pub fn sign_transaction(
    tx: &Transaction,
    keypair: &LedgerKeypair,
) -> Result<SignedTransaction, CodecError> {
    let payload = codec::encode(tx)?;
    let signature = keypair.sign(&signing_hash(&payload)).to_vec();
    Ok(SignedTransaction { payload, signature })
}

/// Sign and encode into the raw bytes a client submits.
pub fn sign_and_encode(tx: &Transaction, keypair: &LedgerKeypair) -> Result<Vec<u8>, CodecError> {
    codec::encode(&sign_transaction(tx, keypair)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
