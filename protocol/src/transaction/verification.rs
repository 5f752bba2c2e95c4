//! Envelope decoding and signature verification.
//!
//! This is the gate every transaction passes twice: once at admission and
//! again at execution, since state can change in between. It is stateless:
//! identical bytes always produce the identical verdict.
//!
//! Checks run cheapest first:
//!
//! 1. Decode the envelope.
//! 2. Decode the payload into a [`Transaction`].
//! 3. Reject an empty sender.
//! 4. Verify the signature over `SHA-256(payload)` against the sender key,
//!    using the payload bytes as received.

use thiserror::Error;

use super::result::ResultCode;
use super::signing::signing_hash;
use super::types::{SignedTransaction, Transaction};
use crate::codec::{self, CodecError};
use crate::crypto::{verify_raw, SignatureError};

/// Reasons a raw transaction fails verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// Envelope or payload bytes are not a valid encoding.
    #[error("malformed transaction: {0}")]
    Decode(#[from] CodecError),

    #[error("transaction header carries no sender key")]
    MissingSender,

    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),
}

impl VerifyError {
    pub fn result_code(&self) -> ResultCode {
        match self {
            VerifyError::Decode(_) => ResultCode::InvalidRequest,
            VerifyError::MissingSender | VerifyError::InvalidSignature(_) => {
                ResultCode::InvalidSignature
            }
        }
    }
}

/// Decode the outer envelope without looking inside the payload.
pub fn decode_envelope(raw_tx: &[u8]) -> Result<SignedTransaction, VerifyError> {
    Ok(codec::decode(raw_tx)?)
}

/// Decode the payload of an envelope and check its signature.
pub fn verify_transaction(envelope: &SignedTransaction) -> Result<Transaction, VerifyError> {
    let tx: Transaction = codec::decode(&envelope.payload)?;

    if tx.header.sender.is_empty() {
        return Err(VerifyError::MissingSender);
    }

    verify_raw(
        &tx.header.sender,
        &signing_hash(&envelope.payload),
        &envelope.signature,
    )?;

    Ok(tx)
}

/// [`decode_envelope`] followed by [`verify_transaction`].
pub fn verify_raw_transaction(raw_tx: &[u8]) -> Result<Transaction, VerifyError> {
    verify_transaction(&decode_envelope(raw_tx)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::LedgerKeypair;
    use crate::transaction::builder::TransactionBuilder;
    use crate::transaction::signing::{sign_and_encode, sign_transaction};

    #[test]
    fn valid_transaction_verifies() {
        let kp = LedgerKeypair::generate();
        let tx = TransactionBuilder::new(&kp).key_value("cometbft", "rocks");
        let raw = sign_and_encode(&tx, &kp).unwrap();
        assert_eq!(verify_raw_transaction(&raw).unwrap(), tx);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = verify_raw_transaction(b"definitely not a transaction").unwrap_err();
        assert!(matches!(err, VerifyError::Decode(_)));
        assert_eq!(err.result_code(), ResultCode::InvalidRequest);
    }

    #[test]
    fn empty_input_is_a_decode_error() {
        assert!(matches!(
            verify_raw_transaction(&[]),
            Err(VerifyError::Decode(_))
        ));
    }

    #[test]
    fn garbage_payload_in_valid_envelope() {
        let envelope = SignedTransaction {
            payload: vec![0xFF; 12],
            signature: vec![0; 64],
        };
        assert!(matches!(
            verify_transaction(&envelope),
            Err(VerifyError::Decode(_))
        ));
    }

    #[test]
    fn missing_sender() {
        let kp = LedgerKeypair::generate();
        let tx = TransactionBuilder::from_sender(Vec::<u8>::new()).key_value("k", "v");
        let envelope = sign_transaction(&tx, &kp).unwrap();
        let err = verify_transaction(&envelope).unwrap_err();
        assert_eq!(err, VerifyError::MissingSender);
        assert_eq!(err.result_code(), ResultCode::InvalidSignature);
    }

    #[test]
    fn signature_by_other_key_fails() {
        let sender = LedgerKeypair::generate();
        let impostor = LedgerKeypair::generate();
        let tx = TransactionBuilder::new(&sender).key_value("k", "v");
        let envelope = sign_transaction(&tx, &impostor).unwrap();
        let err = verify_transaction(&envelope).unwrap_err();
        assert!(matches!(err, VerifyError::InvalidSignature(_)));
        assert_eq!(err.result_code(), ResultCode::InvalidSignature);
    }

    #[test]
    fn tampered_payload_fails() {
        let kp = LedgerKeypair::generate();
        let tx = TransactionBuilder::new(&kp).key_value("k", "v");
        let mut envelope = sign_transaction(&tx, &kp).unwrap();
        let last = envelope.payload.len() - 1;
        envelope.payload[last] ^= 0x01;
        assert!(matches!(
            verify_transaction(&envelope),
            Err(VerifyError::InvalidSignature(_))
        ));
    }

    #[test]
    fn short_sender_key_fails_signature_check() {
        let kp = LedgerKeypair::generate();
        let tx = TransactionBuilder::from_sender([7u8; 5]).key_value("k", "v");
        let envelope = sign_transaction(&tx, &kp).unwrap();
        assert!(matches!(
            verify_transaction(&envelope),
            Err(VerifyError::InvalidSignature(SignatureError::InvalidPublicKey(5)))
        ));
    }

    #[test]
    fn faucet_sender_cannot_be_forged() {
        let kp = LedgerKeypair::generate();
        let tx = TransactionBuilder::from_sender(crate::config::FAUCET_PUBLIC_KEY)
            .key_value("k", "v");
        let mut envelope = sign_transaction(&tx, &kp).unwrap();
        assert!(verify_transaction(&envelope).is_err());
        envelope.signature = vec![0; 64];
        assert!(verify_transaction(&envelope).is_err());
    }
}
