//! # Solo Block Producer
//!
//! A single-validator stand-in for a BFT consensus engine. It drives a
//! [`LedgerApp`] through the same callback sequence a real engine would:
//!
//! ```text
//! startup:   Info ─▶ InitChain (fresh store only)
//! per block: PrepareProposal ─▶ ProcessProposal ─▶ FinalizeBlock ─▶ Commit
//! any time:  CheckTx (mempool admission), Query
//! ```
//!
//! Blocks are produced on a fixed interval, empty or not. Every committed
//! block is published on a broadcast channel so the API can report
//! inclusion and stream blocks to subscribers.
//!
//! The mempool is a bounded FIFO. A full pool or a transaction whose hash is
//! already pending is refused at submission, like a failed CheckTx.
//!
//! Any error from the block lifecycle is fatal: the producer stops and the
//! node shuts down rather than continue from an unknown state. Transactions
//! already drained for that block are logged and counted as dropped.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use kestrel_protocol::app::abci::{
    CheckTxRequest, CheckTxResponse, FinalizeBlockRequest, InfoRequest, InitChainRequest,
    PrepareProposalRequest, ProcessProposalRequest, ProposalStatus,
};
use kestrel_protocol::app::{AppError, Application, LedgerApp};
use kestrel_protocol::crypto::tx_hash;
use kestrel_protocol::transaction::ResultCode;

use crate::metrics::SharedMetrics;

/// Capacity of the committed-block channel. Slow subscribers that fall
/// further behind than this skip blocks.
pub const BLOCK_CHANNEL_CAPACITY: usize = 256;

/// Default mempool capacity, in transactions.
pub const DEFAULT_MAX_MEMPOOL_TXS: usize = 10_000;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Chain id passed to InitChain on a fresh store.
    pub chain_id: String,
    pub block_interval: Duration,
    pub max_block_txs: usize,
    /// Admitted transactions held at most. Submissions beyond it are refused.
    pub max_mempool_txs: usize,
}

// ---------------------------------------------------------------------------
// Mempool
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum MempoolError {
    #[error("transaction {0} is already pending")]
    DuplicateTransaction(String),

    #[error("mempool is full ({size} transactions)")]
    MempoolFull { size: usize },
}

/// Pending transactions in arrival order, indexed by hash.
#[derive(Debug, Default)]
struct Mempool {
    queue: VecDeque<(String, Vec<u8>)>,
    pending: HashSet<String>,
}

impl Mempool {
    fn insert(&mut self, hash: String, tx: Vec<u8>, capacity: usize) -> Result<(), MempoolError> {
        if self.pending.contains(&hash) {
            return Err(MempoolError::DuplicateTransaction(hash));
        }
        if self.queue.len() >= capacity {
            return Err(MempoolError::MempoolFull {
                size: self.queue.len(),
            });
        }
        self.pending.insert(hash.clone());
        self.queue.push_back((hash, tx));
        Ok(())
    }

    /// Remove up to `max` transactions from the front.
    fn take(&mut self, max: usize) -> Vec<Vec<u8>> {
        let count = self.queue.len().min(max);
        self.queue
            .drain(..count)
            .map(|(hash, tx)| {
                self.pending.remove(&hash);
                tx
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

/// One transaction as it landed in a committed block.
#[derive(Debug, Clone, Serialize)]
pub struct IncludedTx {
    pub hash: String,
    pub code: u32,
    pub log: String,
    /// Hex of the encoded transaction result.
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommittedBlock {
    pub height: u64,
    pub app_hash: String,
    pub time: DateTime<Utc>,
    pub txs: Vec<IncludedTx>,
}

impl CommittedBlock {
    pub fn find_tx(&self, hash: &str) -> Option<&IncludedTx> {
        self.txs.iter().find(|tx| tx.hash == hash)
    }
}

/// Outcome of [`SoloEngine::submit_and_wait`].
#[derive(Debug, Clone)]
pub enum Inclusion {
    /// CheckTx refused the transaction; it never entered the mempool.
    Rejected(CheckTxResponse),
    Included { height: u64, tx: IncludedTx },
    /// Admitted, but no block containing it was seen before the deadline.
    TimedOut,
}

/// Mempool plus block producer. Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct SoloEngine {
    app: Arc<LedgerApp>,
    config: EngineConfig,
    mempool: Arc<Mutex<Mempool>>,
    blocks: broadcast::Sender<Arc<CommittedBlock>>,
    metrics: SharedMetrics,
}

impl SoloEngine {
    pub fn new(app: Arc<LedgerApp>, config: EngineConfig, metrics: SharedMetrics) -> Self {
        let (blocks, _) = broadcast::channel(BLOCK_CHANNEL_CAPACITY);
        Self {
            app,
            config,
            mempool: Arc::new(Mutex::new(Mempool::default())),
            blocks,
            metrics,
        }
    }

    pub fn app(&self) -> &Arc<LedgerApp> {
        &self.app
    }

    /// Run the handshake: seed genesis if the store is fresh, otherwise
    /// resume. Returns the last committed height.
    pub fn ensure_genesis(&self) -> Result<u64, AppError> {
        let info = self.app.info(InfoRequest {
            version: env!("CARGO_PKG_VERSION").to_string(),
        })?;

        if !info.last_block_app_hash.is_empty() {
            tracing::info!(
                height = info.last_block_height,
                app_hash = %hex::encode(&info.last_block_app_hash),
                "resuming existing chain"
            );
            self.metrics.block_height.set(info.last_block_height as i64);
            return Ok(info.last_block_height);
        }

        let genesis = self.app.init_chain(InitChainRequest {
            chain_id: self.config.chain_id.clone(),
            initial_height: 1,
        })?;
        tracing::info!(
            chain_id = %self.config.chain_id,
            app_hash = %hex::encode(&genesis.app_hash),
            "genesis applied"
        );
        Ok(0)
    }

    /// Run CheckTx and, if it passes, queue the transaction for the next
    /// block. A full pool or an already pending hash turns an admitted
    /// transaction into a rejection.
    pub fn submit(&self, tx: Vec<u8>) -> Result<CheckTxResponse, AppError> {
        let response = self.app.check_tx(CheckTxRequest { tx: tx.clone() })?;
        if !response.is_ok() {
            self.metrics.transactions_rejected_total.inc();
            return Ok(response);
        }

        let hash = tx_hash(&tx);
        let mut pool = self.mempool.lock();
        match pool.insert(hash, tx, self.config.max_mempool_txs) {
            Ok(()) => {
                self.metrics.transactions_in_mempool.set(pool.len() as i64);
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(error = %e, "mempool refused transaction");
                self.metrics.transactions_rejected_total.inc();
                Ok(CheckTxResponse {
                    code: ResultCode::InvalidRequest.as_u32(),
                    log: e.to_string(),
                })
            }
        }
    }

    /// Submit, then wait up to `timeout` for the block that includes it.
    pub async fn submit_and_wait(
        &self,
        tx: Vec<u8>,
        timeout: Duration,
    ) -> Result<Inclusion, AppError> {
        let hash = tx_hash(&tx);
        // Subscribe first so the including block cannot slip past.
        let mut blocks = self.subscribe();

        let check = self.submit(tx)?;
        if !check.is_ok() {
            return Ok(Inclusion::Rejected(check));
        }

        let wait = async {
            loop {
                match blocks.recv().await {
                    Ok(block) => {
                        if let Some(tx) = block.find_tx(&hash) {
                            return Some((block.height, tx.clone()));
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(tx_hash = %hash, "commit waiter lagged by {} blocks", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(Some((height, tx))) => Ok(Inclusion::Included { height, tx }),
            Ok(None) | Err(_) => Ok(Inclusion::TimedOut),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<CommittedBlock>> {
        self.blocks.subscribe()
    }

    pub fn mempool_len(&self) -> usize {
        self.mempool.lock().len()
    }

    /// Build, execute and commit the next block from the head of the
    /// mempool.
    pub fn produce_block(&self) -> Result<Arc<CommittedBlock>, AppError> {
        let last_height = self.app.info(InfoRequest::default())?.last_block_height;
        let height = last_height
            .checked_add(1)
            .ok_or(AppError::HeightExhausted {
                height: last_height,
            })?;

        let candidates = {
            let mut pool = self.mempool.lock();
            let drained = pool.take(self.config.max_block_txs);
            self.metrics.transactions_in_mempool.set(pool.len() as i64);
            drained
        };

        let drained = candidates.len();
        self.execute_block(height, candidates).map_err(|e| {
            if drained > 0 {
                tracing::error!(
                    height,
                    dropped = drained,
                    error = %e,
                    "block failed, drained transactions dropped"
                );
                self.metrics.transactions_dropped_total.inc_by(drained as u64);
            }
            e
        })
    }

    fn execute_block(
        &self,
        height: u64,
        candidates: Vec<Vec<u8>>,
    ) -> Result<Arc<CommittedBlock>, AppError> {
        let mut txs = self
            .app
            .prepare_proposal(PrepareProposalRequest {
                height,
                txs: candidates,
            })?
            .txs;

        let verdict = self.app.process_proposal(ProcessProposalRequest {
            height,
            txs: txs.clone(),
        })?;
        if verdict.status == ProposalStatus::Reject {
            tracing::warn!(height, dropped = txs.len(), "proposal rejected, committing an empty block");
            txs.clear();
        }

        let started = Instant::now();
        let finalized = self.app.finalize_block(FinalizeBlockRequest {
            height,
            txs: txs.clone(),
        })?;
        self.app.commit()?;
        self.metrics
            .finalize_latency_seconds
            .observe(started.elapsed().as_secs_f64());

        let included: Vec<IncludedTx> = txs
            .iter()
            .zip(finalized.tx_results)
            .map(|(raw, result)| IncludedTx {
                hash: tx_hash(raw),
                code: result.code,
                log: result.log,
                data: hex::encode(result.data),
            })
            .collect();

        let failed = included.iter().filter(|tx| tx.code != 0).count();
        self.metrics.blocks_finalized_total.inc();
        self.metrics
            .transactions_processed_total
            .inc_by(included.len() as u64);
        self.metrics.transactions_failed_total.inc_by(failed as u64);
        self.metrics.block_height.set(height as i64);

        let block = Arc::new(CommittedBlock {
            height,
            app_hash: hex::encode(&finalized.app_hash),
            time: Utc::now(),
            txs: included,
        });

        // No subscribers is not an error.
        let _ = self.blocks.send(Arc::clone(&block));
        Ok(block)
    }

    /// Produce blocks forever. Returns only when a block fails, which the
    /// caller must treat as fatal.
    pub async fn run(self) -> Result<(), AppError> {
        let mut ticker = tokio::time::interval(self.config.block_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.produce_block() {
                Ok(block) => {
                    tracing::debug!(
                        height = block.height,
                        txs = block.txs.len(),
                        app_hash = %block.app_hash,
                        "block committed"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "block production failed, stopping");
                    return Err(e);
                }
            }
        }
    }
}
