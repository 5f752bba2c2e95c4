// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Kestrel Protocol: Ledger State Machine
//!
//! The application half of a replicated ledger. An external BFT consensus
//! engine orders blocks of signed transactions and drives this crate through
//! a fixed set of callbacks; the crate applies each block deterministically
//! to persistent account and key-value state and reports one result per
//! transaction.
//!
//! ## Architecture
//!
//! - **codec**: canonical bincode encoding for everything on the wire or on disk.
//! - **crypto**: SHA-256 and strict Ed25519.
//! - **transaction**: envelope, operations, signing and the verification gate.
//! - **storage**: storage engine contract, sled engine, ledger store and batches.
//! - **executor**: pure transaction rules over a ledger view.
//! - **app**: callback contract, block lifecycle controller, query handler.
//! - **config**: protocol constants.
//!
//! ## Guarantees
//!
//! 1. Same blocks in, same state and same app hash out, on every node.
//! 2. A block's writes land all together at commit or not at all.
//! 3. A bad transaction costs one error result, never the block.
//! 4. A failed commit halts the application instead of continuing on
//!    divergent state.

pub mod app;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod executor;
pub mod storage;
pub mod transaction;
