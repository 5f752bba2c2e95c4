//! Transaction construction.
//!
//! [`TransactionBuilder`] fills in the header (sender, chain id, nonce) and
//! finishes with one of the operation constructors. It never signs; pass the
//! result to [`super::signing::sign_transaction`].

use super::types::{
    CreateAccountOp, KeyValueOp, TokenTransferOp, Transaction, TransactionBody,
    TransactionHeader,
};
use crate::config::DEFAULT_CHAIN_ID;
use crate::crypto::LedgerKeypair;

/// Fluent builder for unsigned [`Transaction`] values.
///
/// ```rust
/// use kestrel_protocol::crypto::LedgerKeypair;
/// use kestrel_protocol::transaction::TransactionBuilder;
///
/// let alice = LedgerKeypair::generate();
/// let bob = LedgerKeypair::generate();
/// let tx = TransactionBuilder::new(&alice)
///     .nonce(1)
///     .transfer(alice.public_key_bytes(), bob.public_key_bytes(), 250);
/// assert_eq!(tx.header.sender, alice.public_key_bytes().to_vec());
/// ```
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    sender: Vec<u8>,
    chain_id: String,
    nonce: u64,
}

impl TransactionBuilder {
    /// Start a transaction sent by `signer`.
    pub fn new(signer: &LedgerKeypair) -> Self {
        Self::from_sender(signer.public_key_bytes())
    }

    /// Start a transaction with an arbitrary sender field. Mostly useful for
    /// exercising the verifier with malformed headers.
    pub fn from_sender(sender: impl AsRef<[u8]>) -> Self {
        Self {
            sender: sender.as_ref().to_vec(),
            chain_id: DEFAULT_CHAIN_ID.to_string(),
            nonce: 0,
        }
    }

    pub fn chain_id(mut self, chain_id: impl Into<String>) -> Self {
        self.chain_id = chain_id.into();
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Finish with an explicit body.
    pub fn body(self, body: TransactionBody) -> Transaction {
        Transaction {
            header: TransactionHeader {
                sender: self.sender,
                chain_id: self.chain_id,
                nonce: self.nonce,
            },
            body,
        }
    }

    pub fn key_value(self, key: impl Into<String>, value: impl Into<String>) -> Transaction {
        self.body(TransactionBody::KeyValue(KeyValueOp {
            key: key.into(),
            value: value.into(),
        }))
    }

    pub fn transfer(self, from: impl AsRef<[u8]>, to: impl AsRef<[u8]>, amount: u64) -> Transaction {
        self.body(TransactionBody::TokenTransfer(TokenTransferOp {
            from: from.as_ref().to_vec(),
            to: to.as_ref().to_vec(),
            amount,
        }))
    }

    pub fn create_account(self, public_key: impl AsRef<[u8]>) -> Transaction {
        self.body(TransactionBody::CreateAccount(CreateAccountOp {
            public_key: public_key.as_ref().to_vec(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::types::TransactionKind;

    #[test]
    fn defaults() {
        let kp = LedgerKeypair::generate();
        let tx = TransactionBuilder::new(&kp).key_value("k", "v");
        assert_eq!(tx.header.sender, kp.public_key_bytes().to_vec());
        assert_eq!(tx.header.chain_id, DEFAULT_CHAIN_ID);
        assert_eq!(tx.header.nonce, 0);
        assert_eq!(tx.body.kind(), TransactionKind::KeyValue);
    }

    #[test]
    fn header_overrides() {
        let kp = LedgerKeypair::generate();
        let tx = TransactionBuilder::new(&kp)
            .chain_id("other-chain")
            .nonce(42)
            .create_account(kp.public_key_bytes());
        assert_eq!(tx.header.chain_id, "other-chain");
        assert_eq!(tx.header.nonce, 42);
    }

    #[test]
    fn transfer_fields() {
        let tx = TransactionBuilder::from_sender([1u8; 32]).transfer([1u8; 32], [2u8; 32], 77);
        match tx.body {
            TransactionBody::TokenTransfer(op) => {
                assert_eq!(op.from, vec![1u8; 32]);
                assert_eq!(op.to, vec![2u8; 32]);
                assert_eq!(op.amount, 77);
            }
            other => panic!("expected transfer, got {:?}", other),
        }
    }

    #[test]
    fn empty_sender_is_representable() {
        let tx = TransactionBuilder::from_sender(Vec::<u8>::new()).key_value("k", "v");
        assert!(tx.header.sender.is_empty());
    }
}
