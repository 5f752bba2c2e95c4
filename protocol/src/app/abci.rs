//! # Consensus Callback Contract
//!
//! The fixed set of calls a BFT consensus engine makes into the application,
//! modeled after ABCI 2.0. The engine owns ordering and sequencing; the
//! application only answers. Requests and responses are plain structs with
//! no transport attached, so any engine binding (socket, gRPC, in-process)
//! can drive an [`Application`].
//!
//! ## Call Order
//!
//! ```text
//! Info ─▶ InitChain ─▶ ┌─▶ PrepareProposal / ProcessProposal
//!                      │   FinalizeBlock(h)
//!                      └── Commit
//! CheckTx and Query may arrive at any time.
//! ```
//!
//! State-sync and vote-extension calls have default implementations that do
//! nothing: no snapshots are offered or accepted, and no extension data is
//! produced or required.

use super::error::AppError;

// ---------------------------------------------------------------------------
// Info
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoRequest {
    /// Version string of the calling engine.
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoResponse {
    pub data: String,
    pub version: String,
    pub app_version: u64,
    /// Zero before genesis.
    pub last_block_height: u64,
    /// Empty before genesis.
    pub last_block_app_hash: Vec<u8>,
}

// ---------------------------------------------------------------------------
// CheckTx
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckTxRequest {
    pub tx: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckTxResponse {
    pub code: u32,
    pub log: String,
}

impl CheckTxResponse {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

// ---------------------------------------------------------------------------
// InitChain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitChainRequest {
    pub chain_id: String,
    /// Height of the first block. Zero is treated as one.
    pub initial_height: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitChainResponse {
    pub app_hash: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Proposals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareProposalRequest {
    pub height: u64,
    pub txs: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareProposalResponse {
    pub txs: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessProposalRequest {
    pub height: u64,
    pub txs: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalStatus {
    Accept,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessProposalResponse {
    pub status: ProposalStatus,
}

// ---------------------------------------------------------------------------
// FinalizeBlock / Commit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizeBlockRequest {
    pub height: u64,
    pub txs: Vec<Vec<u8>>,
}

/// Outcome of one transaction, in the position it occupied in the block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecTxResult {
    pub code: u32,
    /// Encoded [`crate::transaction::TransactionResult`].
    pub data: Vec<u8>,
    pub log: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizeBlockResponse {
    /// Same length and order as the request's `txs`.
    pub tx_results: Vec<ExecTxResult>,
    pub app_hash: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitResponse {
    /// Blocks below this height may be pruned by the engine. Zero keeps all.
    pub retain_height: u64,
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// A read-only lookup. `path` selects the query kind; `data` is its argument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRequest {
    pub path: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResponse {
    pub code: u32,
    pub log: String,
    /// Encoded [`super::query::QueryValue`] on success, empty otherwise.
    pub value: Vec<u8>,
    /// Height of the committed state the answer was read from.
    pub height: u64,
}

// ---------------------------------------------------------------------------
// State sync
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub height: u64,
    pub format: u32,
    pub chunks: u32,
    pub hash: Vec<u8>,
    pub metadata: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSnapshotsResponse {
    pub snapshots: Vec<Snapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferSnapshotRequest {
    pub snapshot: Option<Snapshot>,
    pub app_hash: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferSnapshotResult {
    Accept,
    Abort,
    Reject,
    RejectFormat,
    RejectSender,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferSnapshotResponse {
    pub result: OfferSnapshotResult,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSnapshotChunkRequest {
    pub height: u64,
    pub format: u32,
    pub chunk: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSnapshotChunkResponse {
    pub chunk: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplySnapshotChunkRequest {
    pub index: u32,
    pub chunk: Vec<u8>,
    pub sender: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplySnapshotChunkResult {
    Accept,
    Abort,
    Retry,
    RetrySnapshot,
    RejectSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplySnapshotChunkResponse {
    pub result: ApplySnapshotChunkResult,
}

// ---------------------------------------------------------------------------
// Vote extensions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendVoteRequest {
    pub height: u64,
    pub hash: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendVoteResponse {
    pub vote_extension: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyVoteExtensionRequest {
    pub height: u64,
    pub validator_address: Vec<u8>,
    pub vote_extension: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStatus {
    Accept,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyVoteExtensionResponse {
    pub status: VerifyStatus,
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// The application side of the consensus callback contract.
///
/// Methods take `&self`: the engine may call `check_tx`, `query` and `info`
/// from other threads while a block is being finalized. Implementations
/// serialize the block lifecycle internally.
pub trait Application: Send + Sync {
    fn info(&self, request: InfoRequest) -> Result<InfoResponse, AppError>;

    fn check_tx(&self, request: CheckTxRequest) -> Result<CheckTxResponse, AppError>;

    fn init_chain(&self, request: InitChainRequest) -> Result<InitChainResponse, AppError>;

    /// Propose the mempool's transactions unchanged.
    fn prepare_proposal(
        &self,
        request: PrepareProposalRequest,
    ) -> Result<PrepareProposalResponse, AppError> {
        Ok(PrepareProposalResponse { txs: request.txs })
    }

    /// Accept every proposal; validity is decided per transaction at
    /// execution time.
    fn process_proposal(
        &self,
        _request: ProcessProposalRequest,
    ) -> Result<ProcessProposalResponse, AppError> {
        Ok(ProcessProposalResponse {
            status: ProposalStatus::Accept,
        })
    }

    fn finalize_block(
        &self,
        request: FinalizeBlockRequest,
    ) -> Result<FinalizeBlockResponse, AppError>;

    fn commit(&self) -> Result<CommitResponse, AppError>;

    fn query(&self, request: QueryRequest) -> Result<QueryResponse, AppError>;

    fn list_snapshots(&self) -> Result<ListSnapshotsResponse, AppError> {
        Ok(ListSnapshotsResponse::default())
    }

    fn offer_snapshot(
        &self,
        _request: OfferSnapshotRequest,
    ) -> Result<OfferSnapshotResponse, AppError> {
        Ok(OfferSnapshotResponse {
            result: OfferSnapshotResult::Reject,
        })
    }

    fn load_snapshot_chunk(
        &self,
        _request: LoadSnapshotChunkRequest,
    ) -> Result<LoadSnapshotChunkResponse, AppError> {
        Ok(LoadSnapshotChunkResponse::default())
    }

    fn apply_snapshot_chunk(
        &self,
        _request: ApplySnapshotChunkRequest,
    ) -> Result<ApplySnapshotChunkResponse, AppError> {
        Ok(ApplySnapshotChunkResponse {
            result: ApplySnapshotChunkResult::Accept,
        })
    }

    fn extend_vote(&self, _request: ExtendVoteRequest) -> Result<ExtendVoteResponse, AppError> {
        Ok(ExtendVoteResponse::default())
    }

    fn verify_vote_extension(
        &self,
        _request: VerifyVoteExtensionRequest,
    ) -> Result<VerifyVoteExtensionResponse, AppError> {
        Ok(VerifyVoteExtensionResponse {
            status: VerifyStatus::Accept,
        })
    }
}
