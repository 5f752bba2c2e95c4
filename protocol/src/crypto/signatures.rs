//! # Digital Signatures
//!
//! Ed25519 verification over raw byte components, the way they arrive off
//! the wire. Everything on the execution path goes through [`verify_raw`].
//!
//! ## Strictness
//!
//! Verification uses `verify_strict`, which rejects small-order public keys
//! and small-order `R` components. The reserved faucet key is all zeros, a
//! small-order point, so lenient verification would accept forged
//! signatures for it.

use ed25519_dalek::{Signature as DalekSignature, VerifyingKey};
use thiserror::Error;

use crate::config::{PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};

/// Errors during signature verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid public key: expected 32 bytes encoding a valid point, got {0} bytes")]
    InvalidPublicKey(usize),

    #[error("invalid signature bytes: expected 64 bytes, got {0}")]
    InvalidSignatureBytes(usize),

    #[error("signature verification failed")]
    VerificationFailed,
}

/// Verify an Ed25519 signature given raw public key and signature bytes.
///
/// Length checks come first so malformed input never reaches the curve
/// arithmetic.
pub fn verify_raw(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<(), SignatureError> {
    let key_bytes: [u8; PUBLIC_KEY_LENGTH] = public_key
        .try_into()
        .map_err(|_| SignatureError::InvalidPublicKey(public_key.len()))?;
    let sig_bytes: [u8; SIGNATURE_LENGTH] = signature
        .try_into()
        .map_err(|_| SignatureError::InvalidSignatureBytes(signature.len()))?;

    let verifying_key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|_| SignatureError::InvalidPublicKey(public_key.len()))?;
    let signature = DalekSignature::from_bytes(&sig_bytes);

    verifying_key
        .verify_strict(message, &signature)
        .map_err(|_| SignatureError::VerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::LedgerKeypair;

    #[test]
    fn valid_signature_verifies() {
        let kp = LedgerKeypair::generate();
        let sig = kp.sign(b"hello, ledger");
        assert!(verify_raw(&kp.public_key_bytes(), b"hello, ledger", &sig).is_ok());
    }

    #[test]
    fn wrong_message_fails() {
        let kp = LedgerKeypair::generate();
        let sig = kp.sign(b"correct message");
        assert_eq!(
            verify_raw(&kp.public_key_bytes(), b"wrong message", &sig),
            Err(SignatureError::VerificationFailed)
        );
    }

    #[test]
    fn wrong_key_fails() {
        let kp1 = LedgerKeypair::generate();
        let kp2 = LedgerKeypair::generate();
        let sig = kp1.sign(b"message");
        assert!(verify_raw(&kp2.public_key_bytes(), b"message", &sig).is_err());
    }

    #[test]
    fn short_key_is_rejected_before_verification() {
        let kp = LedgerKeypair::generate();
        let sig = kp.sign(b"m");
        assert_eq!(
            verify_raw(&[1u8; 16], b"m", &sig),
            Err(SignatureError::InvalidPublicKey(16))
        );
    }

    #[test]
    fn short_signature_is_rejected() {
        let kp = LedgerKeypair::generate();
        assert_eq!(
            verify_raw(&kp.public_key_bytes(), b"m", &[0u8; 10]),
            Err(SignatureError::InvalidSignatureBytes(10))
        );
    }

    #[test]
    fn zero_key_never_verifies() {
        // The faucet key. Small-order, so strict verification must refuse it
        // regardless of the signature presented.
        let zero = [0u8; 32];
        assert!(verify_raw(&zero, b"drain the faucet", &[0u8; 64]).is_err());

        let kp = LedgerKeypair::generate();
        let sig = kp.sign(b"drain the faucet");
        assert!(verify_raw(&zero, b"drain the faucet", &sig).is_err());
    }

    #[test]
    fn empty_message_signing() {
        let kp = LedgerKeypair::generate();
        let sig = kp.sign(b"");
        assert!(verify_raw(&kp.public_key_bytes(), b"", &sig).is_ok());
    }
}
