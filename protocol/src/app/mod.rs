//! # Application Module
//!
//! The state machine as the consensus engine sees it.
//!
//! ```text
//! abci.rs      : Application trait + request/response shapes
//! lifecycle.rs : LedgerApp, the block lifecycle controller
//! query.rs     : read-only account / kv lookups
//! error.rs     : contract violations and fatal storage failures
//! ```

pub mod abci;
mod error;
pub mod lifecycle;
pub mod query;

pub use abci::Application;
pub use error::AppError;
pub use lifecycle::LedgerApp;
pub use query::{handle_query, query_account, query_kv, QueryError, QueryValue};
