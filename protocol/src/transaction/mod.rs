//! # Transaction Module
//!
//! The wire model of a ledger transaction and everything needed to produce
//! and check one.
//!
//! ## Architecture
//!
//! ```text
//! types.rs        : envelope, header, and the closed set of operations
//! builder.rs      : fluent TransactionBuilder for unsigned transactions
//! signing.rs      : canonical encoding + Ed25519 over SHA-256(payload)
//! verification.rs : decode and signature gate, shared by CheckTx and execution
//! result.rs       : per-transaction result codes and result records
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Build** with [`TransactionBuilder`].
//! 2. **Sign** with [`sign_transaction`], producing a [`SignedTransaction`].
//! 3. **Admit**: the consensus engine's mempool calls CheckTx, which runs
//!    [`verify_raw_transaction`].
//! 4. **Execute**: the block lifecycle re-verifies and applies the body,
//!    reporting a [`TransactionResult`].

pub mod builder;
pub mod result;
pub mod signing;
pub mod types;
pub mod verification;

pub use builder::TransactionBuilder;
pub use result::{BodyResult, Outcome, ResultCode, ResultError, ResultHeader, TransactionResult};
pub use signing::{sign_and_encode, sign_transaction, signing_hash};
pub use types::{
    CreateAccountOp, KeyValueOp, SignedTransaction, TokenTransferOp, Transaction,
    TransactionBody, TransactionHeader, TransactionKind,
};
pub use verification::{decode_envelope, verify_raw_transaction, verify_transaction, VerifyError};
