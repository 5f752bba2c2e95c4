//! # Ledger Store Adapter
//!
//! Typed access to accounts, key-value entries and chain metadata on top of
//! a [`StorageEngine`].
//!
//! ## Isolation
//!
//! All writes for a block go through one [`LedgerBatch`]. Staged writes live
//! in the batch's own map and are invisible to [`LedgerStore`] readers until
//! [`LedgerBatch::commit`] hands them to the engine as a single atomic batch.
//! Committed reads take a shared lock on the commit gate and the commit takes
//! it exclusively, so a reader sees either the whole block or none of it,
//! whatever the engine.
//!
//! At most one batch exists at a time. A second [`LedgerStore::begin_batch`]
//! while one is alive fails with [`StoreError::BatchAlreadyOpen`].
//!
//! ## Failed commits
//!
//! An engine may report failure after part or all of a batch became
//! readable (sled flushes after applying). Once a commit fails the store is
//! poisoned: every committed read and every new batch fails with
//! [`StoreError::Poisoned`] until the store is reopened.

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::engine::{BatchOp, EngineError, MemoryEngine, SledEngine, StorageEngine};
use super::records::{account_key, chain_meta_key, kv_key, AccountRecord, ChainMeta, KvRecord, Mutation};
use crate::codec::{self, CodecError};
use crate::config::HASH_OUTPUT_LENGTH;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("serialization error: {0}")]
    Codec(#[from] CodecError),

    #[error("a ledger batch is already open")]
    BatchAlreadyOpen,

    #[error("ledger store poisoned by a failed commit; reopen to recover")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// LedgerView
// ---------------------------------------------------------------------------

/// Read access to ledger records. Implemented by the committed store and by
/// an open batch (which overlays its staged writes).
pub trait LedgerView {
    fn get_account(&self, public_key: &[u8]) -> StoreResult<Option<AccountRecord>>;

    fn get_kv(&self, key: &str) -> StoreResult<Option<KvRecord>>;
}

// ---------------------------------------------------------------------------
// LedgerStore
// ---------------------------------------------------------------------------

/// Shared handle to committed ledger state. Clones see the same store.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    engine: Arc<dyn StorageEngine>,
    commit_gate: Arc<RwLock<()>>,
    batch_open: Arc<AtomicBool>,
    poisoned: Arc<AtomicBool>,
}

impl LedgerStore {
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self {
            engine,
            commit_gate: Arc::new(RwLock::new(())),
            batch_open: Arc::new(AtomicBool::new(false)),
            poisoned: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Persistent store backed by sled at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Ok(Self::new(Arc::new(SledEngine::open(path)?)))
    }

    /// sled store deleted on drop.
    pub fn open_temporary() -> StoreResult<Self> {
        Ok(Self::new(Arc::new(SledEngine::open_temporary()?)))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryEngine::new()))
    }

    fn read_raw(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let _gate = self.commit_gate.read();
        self.ensure_healthy()?;
        Ok(self.engine.get(key)?)
    }

    fn ensure_healthy(&self) -> StoreResult<()> {
        if self.is_poisoned() {
            return Err(StoreError::Poisoned);
        }
        Ok(())
    }

    /// Whether a commit through this handle (or a clone) has failed.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    fn read_record<T: DeserializeOwned>(&self, key: &[u8]) -> StoreResult<Option<T>> {
        match self.read_raw(key)? {
            Some(bytes) => Ok(Some(codec::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Last committed chain metadata, or `None` before genesis.
    pub fn chain_meta(&self) -> StoreResult<Option<ChainMeta>> {
        self.read_record(&chain_meta_key())
    }

    /// Open the staging area for one block.
    pub fn begin_batch(&self) -> StoreResult<LedgerBatch> {
        self.ensure_healthy()?;
        self.batch_open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| StoreError::BatchAlreadyOpen)?;
        Ok(LedgerBatch {
            store: self.clone(),
            staged: BTreeMap::new(),
        })
    }

    /// Whether a batch is currently alive.
    pub fn has_open_batch(&self) -> bool {
        self.batch_open.load(Ordering::Acquire)
    }
}

impl LedgerView for LedgerStore {
    fn get_account(&self, public_key: &[u8]) -> StoreResult<Option<AccountRecord>> {
        self.read_record(&account_key(public_key))
    }

    fn get_kv(&self, key: &str) -> StoreResult<Option<KvRecord>> {
        self.read_record(&kv_key(key))
    }
}

// ---------------------------------------------------------------------------
// LedgerBatch
// ---------------------------------------------------------------------------

/// Staged writes for one block. Dropping the batch without committing
/// discards them.
#[derive(Debug)]
pub struct LedgerBatch {
    store: LedgerStore,
    staged: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl LedgerBatch {
    fn read_overlay<T: DeserializeOwned>(&self, key: &[u8]) -> StoreResult<Option<T>> {
        match self.staged.get(key) {
            Some(bytes) => Ok(Some(codec::decode(bytes)?)),
            None => self.store.read_record(key),
        }
    }

    /// Stage the writes of one transaction. Every value is encoded before
    /// any is inserted, so a failure leaves the batch as it was.
    pub fn stage(&mut self, mutations: &[Mutation]) -> StoreResult<()> {
        let encoded = mutations
            .iter()
            .map(|m| -> StoreResult<(Vec<u8>, Vec<u8>)> {
                Ok((m.storage_key(), m.encode_value()?))
            })
            .collect::<StoreResult<Vec<_>>>()?;
        self.staged.extend(encoded);
        Ok(())
    }

    pub fn put_account(&mut self, record: AccountRecord) -> StoreResult<()> {
        self.stage(&[Mutation::PutAccount(record)])
    }

    pub fn put_kv(&mut self, record: KvRecord) -> StoreResult<()> {
        self.stage(&[Mutation::PutKv(record)])
    }

    pub fn put_chain_meta(&mut self, meta: &ChainMeta) -> StoreResult<()> {
        let value = codec::encode(meta)?;
        self.staged.insert(chain_meta_key(), value);
        Ok(())
    }

    /// SHA-256 over the staged writes in key order, each key and value
    /// length-prefixed. Identical staged state gives an identical digest.
    pub fn digest(&self) -> [u8; HASH_OUTPUT_LENGTH] {
        let mut hasher = Sha256::new();
        for (key, value) in &self.staged {
            hasher.update((key.len() as u64).to_le_bytes());
            hasher.update(key);
            hasher.update((value.len() as u64).to_le_bytes());
            hasher.update(value);
        }
        hasher.finalize().into()
    }

    /// Number of distinct keys staged.
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Make every staged write visible and durable, atomically.
    ///
    /// On `Err` the store is poisoned before the commit gate is released, so
    /// no reader observes whatever the engine left behind.
    pub fn commit(mut self) -> StoreResult<()> {
        let ops = std::mem::take(&mut self.staged)
            .into_iter()
            .map(|(key, value)| BatchOp::Put { key, value })
            .collect();
        let _gate = self.store.commit_gate.write();
        self.store.ensure_healthy()?;
        if let Err(e) = self.store.engine.apply_batch(ops) {
            self.store.poisoned.store(true, Ordering::Release);
            return Err(e.into());
        }
        Ok(())
    }
}

impl LedgerView for LedgerBatch {
    fn get_account(&self, public_key: &[u8]) -> StoreResult<Option<AccountRecord>> {
        self.read_overlay(&account_key(public_key))
    }

    fn get_kv(&self, key: &str) -> StoreResult<Option<KvRecord>> {
        self.read_overlay(&kv_key(key))
    }
}

impl Drop for LedgerBatch {
    fn drop(&mut self) {
        self.store.batch_open.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::engine::EngineResult;
    use std::thread;

    fn account(byte: u8, balance: u64) -> AccountRecord {
        AccountRecord::new(vec![byte; 32], balance)
    }

    fn kv(key: &str, value: &str) -> KvRecord {
        KvRecord {
            key: key.into(),
            value: value.into(),
        }
    }

    #[test]
    fn staged_writes_are_invisible_until_commit() {
        let store = LedgerStore::in_memory();
        let mut batch = store.begin_batch().unwrap();
        batch.put_account(account(1, 10)).unwrap();

        assert_eq!(batch.get_account(&[1u8; 32]).unwrap(), Some(account(1, 10)));
        assert_eq!(store.get_account(&[1u8; 32]).unwrap(), None);

        batch.commit().unwrap();
        assert_eq!(store.get_account(&[1u8; 32]).unwrap(), Some(account(1, 10)));
    }

    #[test]
    fn second_batch_is_refused() {
        let store = LedgerStore::in_memory();
        let batch = store.begin_batch().unwrap();
        assert!(store.has_open_batch());
        assert!(matches!(
            store.clone().begin_batch(),
            Err(StoreError::BatchAlreadyOpen)
        ));
        drop(batch);
        assert!(!store.has_open_batch());
        assert!(store.begin_batch().is_ok());
    }

    #[test]
    fn commit_releases_the_batch_slot() {
        let store = LedgerStore::in_memory();
        store.begin_batch().unwrap().commit().unwrap();
        assert!(!store.has_open_batch());
        assert!(store.begin_batch().is_ok());
    }

    #[test]
    fn dropped_batch_discards_writes() {
        let store = LedgerStore::in_memory();
        {
            let mut batch = store.begin_batch().unwrap();
            batch.put_kv(kv("k", "v")).unwrap();
        }
        assert_eq!(store.get_kv("k").unwrap(), None);
    }

    #[test]
    fn overlay_prefers_staged_value() {
        let store = LedgerStore::in_memory();
        let mut batch = store.begin_batch().unwrap();
        batch.put_kv(kv("k", "old")).unwrap();
        batch.commit().unwrap();

        let mut batch = store.begin_batch().unwrap();
        assert_eq!(batch.get_kv("k").unwrap().unwrap().value, "old");
        batch.put_kv(kv("k", "new")).unwrap();
        assert_eq!(batch.get_kv("k").unwrap().unwrap().value, "new");
        assert_eq!(store.get_kv("k").unwrap().unwrap().value, "old");
    }

    #[test]
    fn digest_depends_on_content_not_insertion_order() {
        let a = LedgerStore::in_memory();
        let mut batch_a = a.begin_batch().unwrap();
        batch_a.put_kv(kv("x", "1")).unwrap();
        batch_a.put_kv(kv("y", "2")).unwrap();

        let b = LedgerStore::in_memory();
        let mut batch_b = b.begin_batch().unwrap();
        batch_b.put_kv(kv("y", "2")).unwrap();
        batch_b.put_kv(kv("x", "1")).unwrap();

        assert_eq!(batch_a.digest(), batch_b.digest());

        batch_b.put_kv(kv("x", "changed")).unwrap();
        assert_ne!(batch_a.digest(), batch_b.digest());
    }

    #[test]
    fn chain_meta_round_trips_through_commit() {
        let store = LedgerStore::open_temporary().unwrap();
        assert_eq!(store.chain_meta().unwrap(), None);

        let meta = ChainMeta {
            chain_id: "test".into(),
            last_height: 4,
            app_hash: [3u8; 32],
        };
        let mut batch = store.begin_batch().unwrap();
        batch.put_chain_meta(&meta).unwrap();
        assert_eq!(batch.len(), 1);
        batch.commit().unwrap();

        assert_eq!(store.chain_meta().unwrap(), Some(meta));
    }

    #[test]
    fn persistent_store_reopens() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LedgerStore::open(dir.path()).unwrap();
            let mut batch = store.begin_batch().unwrap();
            batch.put_account(account(7, 700)).unwrap();
            batch.commit().unwrap();
        }
        let store = LedgerStore::open(dir.path()).unwrap();
        assert_eq!(store.get_account(&[7u8; 32]).unwrap(), Some(account(7, 700)));
    }

    /// Applies every batch, then claims the flush failed.
    #[derive(Debug, Default)]
    struct UnflushedEngine {
        inner: MemoryEngine,
        failing: AtomicBool,
    }

    impl StorageEngine for UnflushedEngine {
        fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn apply_batch(&self, ops: Vec<BatchOp>) -> EngineResult<()> {
            self.inner.apply_batch(ops)?;
            if self.failing.load(Ordering::SeqCst) {
                return Err(EngineError::Fault("flush failed".into()));
            }
            Ok(())
        }

        fn flush(&self) -> EngineResult<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_commit_poisons_every_handle() {
        let engine = Arc::new(UnflushedEngine::default());
        let store = LedgerStore::new(engine.clone());
        let reader = store.clone();

        let mut batch = store.begin_batch().unwrap();
        batch.put_kv(kv("k", "good")).unwrap();
        batch.commit().unwrap();
        assert!(!store.is_poisoned());

        engine.failing.store(true, Ordering::SeqCst);
        let mut batch = store.begin_batch().unwrap();
        batch.put_kv(kv("k", "unacknowledged")).unwrap();
        batch.put_account(account(9, 900)).unwrap();
        assert!(matches!(batch.commit(), Err(StoreError::Engine(_))));

        // The engine holds the writes, but no handle will serve them.
        assert!(engine.get(&kv_key("k")).unwrap().is_some());
        assert!(reader.is_poisoned());
        assert!(matches!(reader.get_kv("k"), Err(StoreError::Poisoned)));
        assert!(matches!(reader.get_account(&[9u8; 32]), Err(StoreError::Poisoned)));
        assert!(matches!(reader.chain_meta(), Err(StoreError::Poisoned)));
        assert!(!reader.has_open_batch());
        assert!(matches!(reader.begin_batch(), Err(StoreError::Poisoned)));

        // A fresh adapter over the same engine is how a restart recovers.
        engine.failing.store(false, Ordering::SeqCst);
        let reopened = LedgerStore::new(engine);
        assert_eq!(reopened.get_kv("k").unwrap().unwrap().value, "unacknowledged");
    }

    #[test]
    fn concurrent_readers_never_see_half_a_block() {
        let store = LedgerStore::in_memory();
        let stop = Arc::new(AtomicBool::new(false));

        let reader = {
            let store = store.clone();
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut observations = 0u64;
                loop {
                    let finished = stop.load(Ordering::Acquire);
                    let first = store.get_account(&[1u8; 32]).unwrap();
                    let second = store.get_account(&[2u8; 32]).unwrap();
                    // Every block writes both keys with the same balance. A
                    // block may land between the two reads, so the second
                    // can only be newer than the first.
                    match (&first, &second) {
                        (None, _) => {}
                        (Some(a), Some(b)) => assert!(a.balance <= b.balance),
                        (Some(_), None) => panic!("saw one account without the other"),
                    }
                    observations += 1;
                    if finished {
                        break;
                    }
                }
                observations
            })
        };

        for round in 1..=200u64 {
            let mut batch = store.begin_batch().unwrap();
            batch.put_account(account(1, round)).unwrap();
            batch.put_account(account(2, round)).unwrap();
            batch.commit().unwrap();
        }
        stop.store(true, Ordering::Release);

        assert!(reader.join().unwrap() > 0);
        assert_eq!(store.get_account(&[1u8; 32]).unwrap(), Some(account(1, 200)));
        assert_eq!(store.get_account(&[2u8; 32]).unwrap(), Some(account(2, 200)));
    }
}
