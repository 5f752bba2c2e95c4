//! # Block Lifecycle Controller
//!
//! [`LedgerApp`] implements the callback contract on top of a
//! [`LedgerStore`]. It is the only owner of the open batch.
//!
//! ## Phases
//!
//! ```text
//! Uninitialized ──InitChain──▶ Idle ──FinalizeBlock(h)──▶ BlockOpen(h) ──Commit──▶ Idle
//!                                                              │
//!                                                    commit fails
//!                                                              ▼
//!                                                           Halted
//! ```
//!
//! A store that already holds chain metadata starts in `Idle`, so a
//! restarted node resumes where it left off.
//!
//! ## App Hash
//!
//! Each block chains `app_hash(h) = SHA-256(app_hash(h-1) || digest(batch_h))`
//! where the batch digest covers every staged write in key order. Genesis
//! chains from 32 zero bytes. Two nodes that applied the same blocks agree
//! on the hash; any divergence shows up at the next block.
//!
//! ## Concurrency
//!
//! The phase sits behind a mutex held for the whole of `finalize_block`,
//! `commit` and `init_chain`. `check_tx`, `query` and `info` never take it:
//! they are stateless or read committed state through the store.

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::abci::{
    Application, CheckTxRequest, CheckTxResponse, CommitResponse, ExecTxResult,
    FinalizeBlockRequest, FinalizeBlockResponse, InfoRequest, InfoResponse, InitChainRequest,
    InitChainResponse, QueryRequest, QueryResponse,
};
use super::error::AppError;
use super::query;
use crate::config::{
    APP_NAME, APP_PROTOCOL_VERSION, APP_VERSION, FAUCET_GENESIS_BALANCE, FAUCET_PUBLIC_KEY,
    GENESIS_PARENT_HASH, MAX_TX_SIZE_BYTES,
};
use crate::crypto::{sha256_multi, tx_hash};
use crate::executor::execute;
use crate::storage::{AccountRecord, ChainMeta, LedgerBatch, LedgerStore};
use crate::transaction::{
    verify_raw_transaction, ResultCode, ResultHeader, TransactionResult,
};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Phase {
    Uninitialized,
    Idle(ChainMeta),
    BlockOpen {
        height: u64,
        batch: LedgerBatch,
        /// Metadata that becomes current once the batch commits.
        pending: ChainMeta,
    },
    Halted,
}

// ---------------------------------------------------------------------------
// LedgerApp
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct LedgerApp {
    store: LedgerStore,
    phase: Mutex<Phase>,
}

impl LedgerApp {
    /// Wrap `store`, resuming from its committed chain metadata if any.
    pub fn new(store: LedgerStore) -> Result<Self, AppError> {
        let phase = match store.chain_meta()? {
            Some(meta) => {
                info!(
                    chain_id = %meta.chain_id,
                    height = meta.last_height,
                    app_hash = %hex::encode(meta.app_hash),
                    "resuming ledger from committed state"
                );
                Phase::Idle(meta)
            }
            None => Phase::Uninitialized,
        };
        Ok(Self {
            store,
            phase: Mutex::new(phase),
        })
    }

    /// Handle to the committed store, for read-only callers.
    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn is_halted(&self) -> bool {
        matches!(*self.phase.lock(), Phase::Halted)
    }

    /// Last committed chain metadata.
    pub fn last_committed(&self) -> Result<Option<ChainMeta>, AppError> {
        Ok(self.store.chain_meta()?)
    }

    /// Decode, verify, execute and stage one transaction. Never fails: every
    /// problem becomes a non-zero result.
    fn deliver_tx(&self, batch: &mut LedgerBatch, height: u64, raw_tx: &[u8]) -> ExecTxResult {
        let hash = tx_hash(raw_tx);
        let result = self.run_tx(batch, height, raw_tx, &hash);
        debug!(
            height,
            tx_hash = %hash,
            code = result.code().as_u32(),
            log = result.log(),
            "transaction executed"
        );
        encode_result(&result)
    }

    fn run_tx(
        &self,
        batch: &mut LedgerBatch,
        height: u64,
        raw_tx: &[u8],
        hash: &str,
    ) -> TransactionResult {
        if raw_tx.len() > MAX_TX_SIZE_BYTES {
            return TransactionResult::failure(
                None,
                ResultCode::InvalidRequest,
                format!(
                    "transaction of {} bytes exceeds the {} byte limit",
                    raw_tx.len(),
                    MAX_TX_SIZE_BYTES
                ),
            );
        }

        let tx = match verify_raw_transaction(raw_tx) {
            Ok(tx) => tx,
            Err(e) => return TransactionResult::failure(None, e.result_code(), e.to_string()),
        };

        let header = ResultHeader {
            tx_hash: hash.to_string(),
            block_height: height,
            chain_id: tx.header.chain_id.clone(),
            nonce: tx.header.nonce,
        };

        let execution = match execute(&*batch, &tx) {
            Ok(execution) => execution,
            Err(e) => {
                return TransactionResult::failure(Some(header), e.result_code(), e.to_string())
            }
        };

        match batch.stage(&execution.mutations) {
            Ok(()) => TransactionResult::success(header, execution.body_result),
            Err(e) => TransactionResult::failure(
                Some(header),
                ResultCode::Internal,
                format!("failed to stage writes: {e}"),
            ),
        }
    }
}

/// Encode a result for the `data` field. A result too large to encode is
/// replaced by a small internal error so the block can still proceed.
fn encode_result(result: &TransactionResult) -> ExecTxResult {
    match result.to_bytes() {
        Ok(data) => ExecTxResult {
            code: result.code().as_u32(),
            data,
            log: result.log().to_string(),
        },
        Err(e) => {
            let fallback = TransactionResult::failure(
                None,
                ResultCode::Internal,
                format!("result encoding failed: {e}"),
            );
            ExecTxResult {
                code: ResultCode::Internal.as_u32(),
                data: fallback.to_bytes().unwrap_or_default(),
                log: fallback.log().to_string(),
            }
        }
    }
}

fn chain_app_hash(parent: &[u8; 32], batch: &LedgerBatch) -> [u8; 32] {
    sha256_multi(&[parent.as_slice(), batch.digest().as_slice()])
}

impl Application for LedgerApp {
    fn info(&self, _request: InfoRequest) -> Result<InfoResponse, AppError> {
        let meta = self.store.chain_meta()?;
        Ok(InfoResponse {
            data: APP_NAME.to_string(),
            version: APP_VERSION.to_string(),
            app_version: APP_PROTOCOL_VERSION,
            last_block_height: meta.as_ref().map_or(0, |m| m.last_height),
            last_block_app_hash: meta.map(|m| m.app_hash.to_vec()).unwrap_or_default(),
        })
    }

    fn check_tx(&self, request: CheckTxRequest) -> Result<CheckTxResponse, AppError> {
        if request.tx.len() > MAX_TX_SIZE_BYTES {
            warn!(size = request.tx.len(), "rejected oversized transaction");
            return Ok(CheckTxResponse {
                code: ResultCode::InvalidRequest.as_u32(),
                log: format!(
                    "transaction of {} bytes exceeds the {} byte limit",
                    request.tx.len(),
                    MAX_TX_SIZE_BYTES
                ),
            });
        }

        match verify_raw_transaction(&request.tx) {
            Ok(tx) => {
                debug!(
                    tx_hash = %tx_hash(&request.tx),
                    kind = %tx.body.kind(),
                    "transaction admitted"
                );
                Ok(CheckTxResponse {
                    code: ResultCode::Ok.as_u32(),
                    log: String::new(),
                })
            }
            Err(e) => {
                warn!(
                    tx_hash = %tx_hash(&request.tx),
                    code = e.result_code().as_u32(),
                    error = %e,
                    "transaction rejected at admission"
                );
                Ok(CheckTxResponse {
                    code: e.result_code().as_u32(),
                    log: e.to_string(),
                })
            }
        }
    }

    fn init_chain(&self, request: InitChainRequest) -> Result<InitChainResponse, AppError> {
        let mut phase = self.phase.lock();
        match &*phase {
            Phase::Uninitialized => {}
            Phase::Idle(meta) => {
                warn!(
                    chain_id = %meta.chain_id,
                    height = meta.last_height,
                    "genesis already applied, ignoring InitChain"
                );
                return Ok(InitChainResponse {
                    app_hash: meta.app_hash.to_vec(),
                });
            }
            Phase::BlockOpen { height, .. } => {
                return Err(AppError::BlockInProgress { height: *height })
            }
            Phase::Halted => return Err(AppError::Halted),
        }

        // Never zero, so the genesis height below cannot underflow.
        let initial_height = request.initial_height.max(1);
        let mut batch = self.store.begin_batch()?;
        batch.put_account(AccountRecord::new(
            FAUCET_PUBLIC_KEY.to_vec(),
            FAUCET_GENESIS_BALANCE,
        ))?;
        let meta = ChainMeta {
            chain_id: request.chain_id,
            last_height: initial_height - 1,
            app_hash: chain_app_hash(&GENESIS_PARENT_HASH, &batch),
        };
        batch.put_chain_meta(&meta)?;

        if let Err(e) = batch.commit() {
            error!(error = %e, "genesis commit failed, halting");
            *phase = Phase::Halted;
            return Err(AppError::Storage(e));
        }

        info!(
            chain_id = %meta.chain_id,
            initial_height,
            app_hash = %hex::encode(meta.app_hash),
            "genesis seeded"
        );
        let app_hash = meta.app_hash.to_vec();
        *phase = Phase::Idle(meta);
        Ok(InitChainResponse { app_hash })
    }

    fn finalize_block(
        &self,
        request: FinalizeBlockRequest,
    ) -> Result<FinalizeBlockResponse, AppError> {
        let mut phase = self.phase.lock();
        let parent = match &*phase {
            Phase::Idle(meta) => meta.clone(),
            Phase::Uninitialized => return Err(AppError::NotInitialized),
            Phase::BlockOpen { height, .. } => {
                return Err(AppError::BlockInProgress { height: *height })
            }
            Phase::Halted => return Err(AppError::Halted),
        };

        let expected = parent
            .last_height
            .checked_add(1)
            .ok_or(AppError::HeightExhausted {
                height: parent.last_height,
            })?;
        if request.height != expected {
            return Err(AppError::UnexpectedHeight {
                expected,
                got: request.height,
            });
        }

        let mut batch = self.store.begin_batch()?;
        let tx_results: Vec<ExecTxResult> = request
            .txs
            .iter()
            .map(|raw_tx| self.deliver_tx(&mut batch, request.height, raw_tx))
            .collect();

        let pending = ChainMeta {
            chain_id: parent.chain_id,
            last_height: request.height,
            app_hash: chain_app_hash(&parent.app_hash, &batch),
        };
        batch.put_chain_meta(&pending)?;

        let failed = tx_results.iter().filter(|r| r.code != 0).count();
        info!(
            height = request.height,
            txs = tx_results.len(),
            failed,
            app_hash = %hex::encode(pending.app_hash),
            "finalized block"
        );

        let app_hash = pending.app_hash.to_vec();
        *phase = Phase::BlockOpen {
            height: request.height,
            batch,
            pending,
        };
        Ok(FinalizeBlockResponse {
            tx_results,
            app_hash,
        })
    }

    fn commit(&self) -> Result<CommitResponse, AppError> {
        let mut phase = self.phase.lock();
        match std::mem::replace(&mut *phase, Phase::Halted) {
            Phase::BlockOpen {
                height,
                batch,
                pending,
            } => match batch.commit() {
                Ok(()) => {
                    info!(height, "committed block");
                    *phase = Phase::Idle(pending);
                    Ok(CommitResponse { retain_height: 0 })
                }
                Err(e) => {
                    error!(height, error = %e, "commit failed, halting");
                    Err(AppError::Storage(e))
                }
            },
            Phase::Halted => Err(AppError::Halted),
            other => {
                let err = match &other {
                    Phase::Uninitialized => AppError::NotInitialized,
                    _ => AppError::NoBlockInProgress,
                };
                *phase = other;
                Err(err)
            }
        }
    }

    fn query(&self, request: QueryRequest) -> Result<QueryResponse, AppError> {
        let height = self
            .store
            .chain_meta()?
            .map_or(0, |meta| meta.last_height);
        let response = query::respond(&self.store, &request, height);
        debug!(path = %request.path, code = response.code, "query served");
        Ok(response)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::LedgerKeypair;
    use crate::transaction::{sign_and_encode, TransactionBuilder};

    fn genesis_app() -> LedgerApp {
        let app = LedgerApp::new(LedgerStore::in_memory()).unwrap();
        app.init_chain(InitChainRequest {
            chain_id: "test-chain".into(),
            initial_height: 1,
        })
        .unwrap();
        app
    }

    fn kv_tx(key: &str, value: &str) -> Vec<u8> {
        let kp = LedgerKeypair::generate();
        sign_and_encode(&TransactionBuilder::new(&kp).key_value(key, value), &kp).unwrap()
    }

    fn finalize(app: &LedgerApp, height: u64, txs: Vec<Vec<u8>>) -> FinalizeBlockResponse {
        app.finalize_block(FinalizeBlockRequest { height, txs }).unwrap()
    }

    #[test]
    fn fresh_store_is_uninitialized() {
        let app = LedgerApp::new(LedgerStore::in_memory()).unwrap();
        let info = app.info(InfoRequest::default()).unwrap();
        assert_eq!(info.last_block_height, 0);
        assert!(info.last_block_app_hash.is_empty());
        assert!(matches!(
            app.finalize_block(FinalizeBlockRequest { height: 1, txs: vec![] }),
            Err(AppError::NotInitialized)
        ));
    }

    #[test]
    fn info_reports_identity() {
        let app = genesis_app();
        let info = app.info(InfoRequest::default()).unwrap();
        assert_eq!(info.data, APP_NAME);
        assert_eq!(info.app_version, APP_PROTOCOL_VERSION);
        assert_eq!(info.last_block_app_hash.len(), 32);
    }

    #[test]
    fn block_cycle_advances_height() {
        let app = genesis_app();
        finalize(&app, 1, vec![kv_tx("a", "1")]);
        app.commit().unwrap();
        finalize(&app, 2, vec![]);
        app.commit().unwrap();

        let info = app.info(InfoRequest::default()).unwrap();
        assert_eq!(info.last_block_height, 2);
    }

    #[test]
    fn initial_height_is_respected() {
        let app = LedgerApp::new(LedgerStore::in_memory()).unwrap();
        app.init_chain(InitChainRequest {
            chain_id: "late".into(),
            initial_height: 100,
        })
        .unwrap();
        assert!(matches!(
            app.finalize_block(FinalizeBlockRequest { height: 1, txs: vec![] }),
            Err(AppError::UnexpectedHeight { expected: 100, got: 1 })
        ));
        finalize(&app, 100, vec![]);
        app.commit().unwrap();
    }

    #[test]
    fn last_possible_height_ends_the_chain() {
        let app = LedgerApp::new(LedgerStore::in_memory()).unwrap();
        app.init_chain(InitChainRequest {
            chain_id: "edge".into(),
            initial_height: u64::MAX,
        })
        .unwrap();
        assert_eq!(
            app.info(InfoRequest::default()).unwrap().last_block_height,
            u64::MAX - 1
        );

        finalize(&app, u64::MAX, vec![kv_tx("end", "of chain")]);
        app.commit().unwrap();

        for height in [0, 1, u64::MAX] {
            assert!(matches!(
                app.finalize_block(FinalizeBlockRequest { height, txs: vec![] }),
                Err(AppError::HeightExhausted { height: u64::MAX })
            ));
        }
        assert!(!app.is_halted());
        assert!(!app.store().has_open_batch());
        let info = app.info(InfoRequest::default()).unwrap();
        assert_eq!(info.last_block_height, u64::MAX);
    }

    #[test]
    fn finalize_twice_without_commit_fails() {
        let app = genesis_app();
        finalize(&app, 1, vec![]);
        assert!(matches!(
            app.finalize_block(FinalizeBlockRequest { height: 2, txs: vec![] }),
            Err(AppError::BlockInProgress { height: 1 })
        ));
        app.commit().unwrap();
    }

    #[test]
    fn commit_without_finalize_fails() {
        let app = genesis_app();
        assert!(matches!(app.commit(), Err(AppError::NoBlockInProgress)));
        // State is untouched; the next block still works.
        finalize(&app, 1, vec![]);
        app.commit().unwrap();
    }

    #[test]
    fn app_hash_changes_with_state_and_chains() {
        let app = genesis_app();
        let genesis_hash = app.info(InfoRequest::default()).unwrap().last_block_app_hash;

        let first = finalize(&app, 1, vec![]);
        app.commit().unwrap();
        assert_ne!(first.app_hash, genesis_hash);

        let second = finalize(&app, 2, vec![]);
        app.commit().unwrap();
        assert_ne!(second.app_hash, first.app_hash);
    }

    #[test]
    fn results_preserve_order_and_length() {
        let app = genesis_app();
        let txs = vec![kv_tx("a", "1"), b"junk".to_vec(), kv_tx("b", "2")];
        let response = finalize(&app, 1, txs);
        let codes: Vec<u32> = response.tx_results.iter().map(|r| r.code).collect();
        assert_eq!(codes, vec![0, ResultCode::InvalidRequest.as_u32(), 0]);

        let decoded = TransactionResult::from_bytes(&response.tx_results[1].data).unwrap();
        assert!(decoded.header.is_none());
        app.commit().unwrap();
    }

    #[test]
    fn queries_do_not_see_open_block() {
        let app = genesis_app();
        finalize(&app, 1, vec![kv_tx("pending", "yes")]);

        let before = app.query(QueryRequest::kv("pending")).unwrap();
        assert_eq!(before.code, ResultCode::NotFound.as_u32());
        assert_eq!(before.height, 0);

        app.commit().unwrap();
        let after = app.query(QueryRequest::kv("pending")).unwrap();
        assert_eq!(after.code, 0);
        assert_eq!(after.height, 1);
    }

    #[test]
    fn check_tx_codes() {
        let app = genesis_app();
        assert!(app.check_tx(CheckTxRequest { tx: kv_tx("k", "v") }).unwrap().is_ok());

        let bad = app
            .check_tx(CheckTxRequest {
                tx: b"garbage".to_vec(),
            })
            .unwrap();
        assert_eq!(bad.code, ResultCode::InvalidRequest.as_u32());
        assert!(!bad.log.is_empty());

        let huge = app
            .check_tx(CheckTxRequest {
                tx: vec![0u8; MAX_TX_SIZE_BYTES + 1],
            })
            .unwrap();
        assert_eq!(huge.code, ResultCode::InvalidRequest.as_u32());
    }

    #[test]
    fn restart_resumes_from_store() {
        let store = LedgerStore::in_memory();
        let hash = {
            let app = LedgerApp::new(store.clone()).unwrap();
            app.init_chain(InitChainRequest {
                chain_id: "resume".into(),
                initial_height: 1,
            })
            .unwrap();
            let response = finalize(&app, 1, vec![kv_tx("k", "v")]);
            app.commit().unwrap();
            response.app_hash
        };

        let app = LedgerApp::new(store).unwrap();
        let info = app.info(InfoRequest::default()).unwrap();
        assert_eq!(info.last_block_height, 1);
        assert_eq!(info.last_block_app_hash, hash);
        finalize(&app, 2, vec![]);
        app.commit().unwrap();
    }

    #[test]
    fn stub_callbacks() {
        use super::super::abci::*;
        let app = genesis_app();
        assert!(app.list_snapshots().unwrap().snapshots.is_empty());
        assert_eq!(
            app.offer_snapshot(OfferSnapshotRequest::default()).unwrap().result,
            OfferSnapshotResult::Reject
        );
        assert!(app
            .load_snapshot_chunk(LoadSnapshotChunkRequest::default())
            .unwrap()
            .chunk
            .is_empty());
        assert_eq!(
            app.apply_snapshot_chunk(ApplySnapshotChunkRequest::default())
                .unwrap()
                .result,
            ApplySnapshotChunkResult::Accept
        );
        assert!(app
            .extend_vote(ExtendVoteRequest::default())
            .unwrap()
            .vote_extension
            .is_empty());
        assert_eq!(
            app.verify_vote_extension(VerifyVoteExtensionRequest::default())
                .unwrap()
                .status,
            VerifyStatus::Accept
        );

        let txs = vec![b"b".to_vec(), b"a".to_vec()];
        let prepared = app
            .prepare_proposal(PrepareProposalRequest {
                height: 1,
                txs: txs.clone(),
            })
            .unwrap();
        assert_eq!(prepared.txs, txs);
        assert_eq!(
            app.process_proposal(ProcessProposalRequest { height: 1, txs })
                .unwrap()
                .status,
            ProposalStatus::Accept
        );
    }
}
