//! # REST + WebSocket API
//!
//! Builds the axum router for the devnet node. Handlers share state through
//! axum's `State` extractor. Binary payloads (transactions, query data,
//! results) travel as hex strings.
//!
//! ## Endpoints
//!
//! | Method | Path                    | Description                              |
//! |--------|-------------------------|------------------------------------------|
//! | GET    | `/health`               | Liveness check                           |
//! | GET    | `/status`               | Chain height, app hash, mempool size     |
//! | POST   | `/broadcast_tx_sync`    | CheckTx and queue; returns immediately   |
//! | POST   | `/broadcast_tx_commit`  | Queue and wait for the including block   |
//! | POST   | `/abci_query`           | Raw path/data query                      |
//! | GET    | `/accounts/:public_key` | Account by hex public key                |
//! | GET    | `/kv/:key`              | Key-value record                         |
//! | GET    | `/ws`                   | WebSocket stream of committed blocks     |

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use kestrel_protocol::app::abci::QueryRequest;
use kestrel_protocol::app::{query_account, query_kv, AppError, Application, QueryError};
use kestrel_protocol::crypto::tx_hash;
use kestrel_protocol::storage::StoreError;

use crate::devnet::{Inclusion, SoloEngine};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared state for all handlers. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub version: String,
    pub engine: SoloEngine,
    /// Upper bound on how long `/broadcast_tx_commit` waits.
    pub commit_timeout: Duration,
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct BroadcastTxRequest {
    /// Hex-encoded signed transaction envelope.
    pub tx: String,
}

#[derive(Debug, Serialize)]
pub struct CheckTxBody {
    pub code: u32,
    pub log: String,
}

#[derive(Debug, Serialize)]
pub struct BroadcastTxSyncResponse {
    pub hash: String,
    pub code: u32,
    pub log: String,
}

#[derive(Debug, Serialize)]
pub struct TxResultBody {
    pub code: u32,
    pub log: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct BroadcastTxCommitResponse {
    pub hash: String,
    pub check_tx: CheckTxBody,
    /// Absent when CheckTx rejected the transaction.
    pub tx_result: Option<TxResultBody>,
    pub height: u64,
}

#[derive(Debug, Deserialize)]
pub struct AbciQueryRequest {
    pub path: String,
    /// Hex-encoded query argument.
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct AbciQueryResponse {
    pub code: u32,
    pub log: String,
    pub value: String,
    pub height: u64,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub chain_id: Option<String>,
    pub block_height: u64,
    pub app_hash: String,
    pub mempool_size: usize,
    pub halted: bool,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub public_key: String,
    pub balance: u64,
}

#[derive(Debug, Serialize)]
pub struct KvResponse {
    pub key: String,
    pub value: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Handler error rendered as `{"error": "..."}` with a matching status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = match err {
            AppError::Halted | AppError::Storage(StoreError::Poisoned) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        let status = match err {
            QueryError::NotFound => StatusCode::NOT_FOUND,
            QueryError::UnsupportedQuery(_) | QueryError::Decode(_) => StatusCode::BAD_REQUEST,
            QueryError::Storage(StoreError::Poisoned) => StatusCode::SERVICE_UNAVAILABLE,
            QueryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, ApiError> {
    hex::decode(value.trim_start_matches("0x"))
        .map_err(|e| ApiError::bad_request(format!("{field} is not valid hex: {e}")))
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full router with CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/broadcast_tx_sync", post(broadcast_tx_sync_handler))
        .route("/broadcast_tx_commit", post(broadcast_tx_commit_handler))
        .route("/abci_query", post(abci_query_handler))
        .route("/accounts/:public_key", get(account_handler))
        .route("/kv/:key", get(kv_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: 200 while the process is up.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`
async fn status_handler(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let app = state.engine.app();
    let meta = app.last_committed()?;

    Ok(Json(StatusResponse {
        version: state.version.clone(),
        chain_id: meta.as_ref().map(|m| m.chain_id.clone()),
        block_height: meta.as_ref().map_or(0, |m| m.last_height),
        app_hash: meta.map(|m| hex::encode(m.app_hash)).unwrap_or_default(),
        mempool_size: state.engine.mempool_len(),
        halted: app.is_halted(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

/// `POST /broadcast_tx_sync`: run CheckTx and queue on success. The HTTP
/// status is 200 either way; the admission verdict is in `code`.
async fn broadcast_tx_sync_handler(
    State(state): State<AppState>,
    Json(req): Json<BroadcastTxRequest>,
) -> Result<Json<BroadcastTxSyncResponse>, ApiError> {
    let tx = decode_hex("tx", &req.tx)?;
    let hash = tx_hash(&tx);
    let check = state.engine.submit(tx)?;

    Ok(Json(BroadcastTxSyncResponse {
        hash,
        code: check.code,
        log: check.log,
    }))
}

/// `POST /broadcast_tx_commit`: queue, then wait for the block that
/// includes the transaction. Answers 504 if none arrives in time.
async fn broadcast_tx_commit_handler(
    State(state): State<AppState>,
    Json(req): Json<BroadcastTxRequest>,
) -> Result<Response, ApiError> {
    let tx = decode_hex("tx", &req.tx)?;
    let hash = tx_hash(&tx);

    let outcome = state
        .engine
        .submit_and_wait(tx, state.commit_timeout)
        .await?;

    let response = match outcome {
        Inclusion::Rejected(check) => BroadcastTxCommitResponse {
            hash,
            check_tx: CheckTxBody {
                code: check.code,
                log: check.log,
            },
            tx_result: None,
            height: 0,
        },
        Inclusion::Included { height, tx } => BroadcastTxCommitResponse {
            hash,
            check_tx: CheckTxBody {
                code: 0,
                log: String::new(),
            },
            tx_result: Some(TxResultBody {
                code: tx.code,
                log: tx.log,
                data: tx.data,
            }),
            height,
        },
        Inclusion::TimedOut => {
            return Ok((
                StatusCode::GATEWAY_TIMEOUT,
                Json(serde_json::json!({
                    "error": "timed out waiting for the transaction to be committed",
                    "hash": hash,
                })),
            )
                .into_response());
        }
    };
    Ok(Json(response).into_response())
}

/// `POST /abci_query`: pass-through to the application's Query. Failures
/// are reported in `code`, not the HTTP status.
async fn abci_query_handler(
    State(state): State<AppState>,
    Json(req): Json<AbciQueryRequest>,
) -> Result<Json<AbciQueryResponse>, ApiError> {
    let data = decode_hex("data", &req.data)?;
    let response = state.engine.app().query(QueryRequest {
        path: req.path,
        data,
    })?;

    Ok(Json(AbciQueryResponse {
        code: response.code,
        log: response.log,
        value: hex::encode(response.value),
        height: response.height,
    }))
}

/// `GET /accounts/:public_key`
async fn account_handler(
    Path(public_key): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AccountResponse>, ApiError> {
    let key = decode_hex("public key", &public_key)?;
    let account = query_account(state.engine.app().store(), &key).map_err(|e| match e {
        QueryError::NotFound => ApiError::not_found(format!("no account {public_key}")),
        other => other.into(),
    })?;

    Ok(Json(AccountResponse {
        public_key: hex::encode(&account.public_key),
        balance: account.balance,
    }))
}

/// `GET /kv/:key`
async fn kv_handler(
    Path(key): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<KvResponse>, ApiError> {
    let record = query_kv(state.engine.app().store(), &key)?;
    Ok(Json(KvResponse {
        key: record.key,
        value: record.value,
    }))
}

/// `GET /ws`: push each committed block as JSON. Client messages are
/// ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.engine.subscribe();

    loop {
        tokio::select! {
            block = rx.recv() => {
                match block {
                    Ok(block) => {
                        let payload = match serde_json::to_string(&*block) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize block: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} blocks", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
