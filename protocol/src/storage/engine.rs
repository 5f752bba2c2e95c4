//! # Storage Engines
//!
//! The ledger needs very little from the underlying store: point lookups and
//! an atomic, durable multi-key batch. [`StorageEngine`] captures exactly
//! that, so the ledger adapter never sees engine internals.
//!
//! Two implementations ship with the crate:
//!
//! - [`SledEngine`]: sled's embedded B+ tree. One tree holds every
//!   namespace; keys carry their own prefix. Batches go through
//!   `Tree::apply_batch`, which sled applies atomically, followed by a flush.
//! - [`MemoryEngine`]: an ordered map behind a lock, for tests and
//!   throwaway devnets.

use parking_lot::RwLock;
use sled::{Batch, Db, Tree};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors raised by a storage engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Any other I/O-level failure an engine wants to surface.
    #[error("storage fault: {0}")]
    Fault(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

// ---------------------------------------------------------------------------
// Engine Contract
// ---------------------------------------------------------------------------

/// A single write inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Ordered byte-keyed store with atomic batch commits.
///
/// `apply_batch` must be atomic with respect to readers: a `get` never sees
/// part of a batch. On `Ok`, every operation is visible and survives a
/// restart. On `Err` the batch may or may not be visible (sled can fail its
/// flush after the tree batch landed), so callers must stop trusting reads.
pub trait StorageEngine: Send + Sync + fmt::Debug {
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>>;

    fn apply_batch(&self, ops: Vec<BatchOp>) -> EngineResult<()>;

    fn flush(&self) -> EngineResult<()>;
}

// ---------------------------------------------------------------------------
// SledEngine
// ---------------------------------------------------------------------------

const LEDGER_TREE: &str = "ledger";

/// sled-backed engine. Cheap to clone; clones share the same database.
#[derive(Debug, Clone)]
pub struct SledEngine {
    db: Db,
    tree: Tree,
}

impl SledEngine {
    /// Open or create a database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A database that is removed when the last handle drops.
    pub fn open_temporary() -> EngineResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> EngineResult<Self> {
        let tree = db.open_tree(LEDGER_TREE)?;
        Ok(Self { db, tree })
    }

    /// Approximate on-disk size in bytes.
    pub fn size_on_disk(&self) -> EngineResult<u64> {
        Ok(self.db.size_on_disk()?)
    }
}

impl StorageEngine for SledEngine {
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        Ok(self.tree.get(key)?.map(|v| v.to_vec()))
    }

    fn apply_batch(&self, ops: Vec<BatchOp>) -> EngineResult<()> {
        let mut batch = Batch::default();
        for op in ops {
            match op {
                BatchOp::Put { key, value } => batch.insert(key, value),
                BatchOp::Delete { key } => batch.remove(key),
            }
        }
        self.tree.apply_batch(batch)?;
        // Applied but possibly not durable if this fails.
        self.db.flush()?;
        Ok(())
    }

    fn flush(&self) -> EngineResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryEngine
// ---------------------------------------------------------------------------

/// In-memory engine. Batches are applied under one write lock, which makes
/// them atomic with respect to readers.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl StorageEngine for MemoryEngine {
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn apply_batch(&self, ops: Vec<BatchOp>) -> EngineResult<()> {
        let mut map = self.map.write();
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    map.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn flush(&self) -> EngineResult<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
