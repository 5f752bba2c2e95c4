//! # Storage Module
//!
//! Persistent ledger state.
//!
//! ## Architecture
//!
//! ```text
//! engine.rs  : StorageEngine contract, sled and in-memory engines
//! records.rs : account / kv / chain-meta records and their keys
//! ledger.rs  : LedgerStore (committed reads) and LedgerBatch (one block's writes)
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! executor ──reads──▶ LedgerBatch ──miss──▶ LedgerStore ──▶ StorageEngine
//!     │                    ▲
//!     └──Vec<Mutation>─────┘ stage()        commit() ──atomic batch──▶ engine
//! ```
//!
//! Queries read [`LedgerStore`] directly and never see staged writes.

pub mod engine;
pub mod ledger;
pub mod records;

pub use engine::{BatchOp, EngineError, MemoryEngine, SledEngine, StorageEngine};
pub use ledger::{LedgerBatch, LedgerStore, LedgerView, StoreError, StoreResult};
pub use records::{AccountRecord, ChainMeta, KvRecord, Mutation};
