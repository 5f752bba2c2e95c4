//! # CLI Interface
//!
//! Command-line arguments for `kestrel-node`, via `clap` derive. Every
//! runtime setting of `run` can also come from a `KESTREL_*` environment
//! variable.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use kestrel_protocol::config::DEFAULT_CHAIN_ID;

use crate::devnet::DEFAULT_MAX_MEMPOOL_TXS;
use crate::logging::LogFormat;

/// Kestrel single-validator devnet node.
///
/// Runs the ledger state machine behind an in-process block producer and
/// serves an HTTP API for submitting transactions and queries.
#[derive(Parser, Debug)]
#[command(
    name = "kestrel-node",
    about = "Kestrel ledger devnet node",
    version,
    propagate_version = true
)]
pub struct KestrelNodeCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Generate an Ed25519 keypair for signing transactions.
    Keygen(KeygenArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Directory holding the ledger database. Created if missing.
    #[arg(long, short = 'd', env = "KESTREL_DATA_DIR", default_value = ".kestrel")]
    pub data_dir: PathBuf,

    /// Keep all state in memory. Nothing survives a restart.
    #[arg(long, env = "KESTREL_IN_MEMORY")]
    pub in_memory: bool,

    /// Port for the HTTP API.
    #[arg(long, env = "KESTREL_RPC_PORT", default_value_t = 26657)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "KESTREL_METRICS_PORT", default_value_t = 26660)]
    pub metrics_port: u16,

    /// Milliseconds between blocks.
    #[arg(long, env = "KESTREL_BLOCK_INTERVAL_MS", default_value_t = 1000)]
    pub block_interval_ms: u64,

    /// Upper bound on transactions per block.
    #[arg(long, env = "KESTREL_MAX_BLOCK_TXS", default_value_t = 500)]
    pub max_block_txs: usize,

    /// Admitted transactions the mempool holds before refusing new ones.
    #[arg(long, env = "KESTREL_MAX_MEMPOOL_TXS", default_value_t = DEFAULT_MAX_MEMPOOL_TXS)]
    pub max_mempool_txs: usize,

    /// How long `broadcast_tx_commit` waits for inclusion, in milliseconds.
    #[arg(long, env = "KESTREL_COMMIT_TIMEOUT_MS", default_value_t = 10_000)]
    pub commit_timeout_ms: u64,

    /// Chain id used at genesis. Ignored when resuming an existing chain.
    #[arg(long, env = "KESTREL_CHAIN_ID", default_value = DEFAULT_CHAIN_ID)]
    pub chain_id: String,

    /// Default log filter when RUST_LOG is not set.
    #[arg(
        long,
        env = "KESTREL_LOG_LEVEL",
        default_value = "kestrel_node=info,kestrel_protocol=info,tower_http=info"
    )]
    pub log_level: String,

    /// Log output format.
    #[arg(long, env = "KESTREL_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Print the keypair as a JSON object.
    #[arg(long)]
    pub json: bool,
}
