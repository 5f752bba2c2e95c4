//! # Cryptographic Primitives
//!
//! Thin, typed wrappers over audited implementations:
//!
//! - **Ed25519** (`ed25519-dalek`) for transaction signatures, verified
//!   strictly.
//! - **SHA-256** (`sha2`) for the signing hash, transaction hashes and the
//!   chained app hash.
//!
//! Nothing in here touches ledger state. Identical input always yields
//! identical output, which is what lets independent nodes agree.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{sha256, sha256_multi, tx_hash};
pub use keys::{KeyError, LedgerKeypair};
pub use signatures::{verify_raw, SignatureError};
