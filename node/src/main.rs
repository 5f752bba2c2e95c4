// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Kestrel Devnet Node
//!
//! Entry point for the `kestrel-node` binary. Parses CLI arguments, sets up
//! logging and metrics, opens the ledger, and runs the solo block producer
//! alongside the HTTP API.
//!
//! Subcommands:
//!
//! - `run`: start the node
//! - `keygen`: print a fresh Ed25519 keypair
//! - `version`: print build version information

mod api;
mod cli;
mod devnet;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use kestrel_protocol::app::LedgerApp;
use kestrel_protocol::crypto::LedgerKeypair;
use kestrel_protocol::storage::LedgerStore;

use cli::{Commands, KestrelNodeCli};
use devnet::{EngineConfig, SoloEngine};
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = KestrelNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Keygen(args) => keygen(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn open_store(args: &cli::RunArgs) -> Result<LedgerStore> {
    if args.in_memory {
        tracing::warn!("running with in-memory storage; state is lost on exit");
        return Ok(LedgerStore::in_memory());
    }

    let db_path = args.data_dir.join("ledger");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    let store = LedgerStore::open(&db_path)
        .with_context(|| format!("failed to open ledger at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "ledger opened");
    Ok(store)
}

/// Starts the node: ledger, block producer, API server and metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(&args.log_level, args.log_format)?;

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        block_interval_ms = args.block_interval_ms,
        data_dir = %args.data_dir.display(),
        "starting kestrel-node"
    );

    let store = open_store(&args)?;
    let app = Arc::new(LedgerApp::new(store).context("failed to load chain state")?);
    let node_metrics = Arc::new(NodeMetrics::new());

    let engine = SoloEngine::new(
        Arc::clone(&app),
        EngineConfig {
            chain_id: args.chain_id.clone(),
            block_interval: Duration::from_millis(args.block_interval_ms.max(1)),
            max_block_txs: args.max_block_txs.max(1),
            max_mempool_txs: args.max_mempool_txs.max(1),
        },
        Arc::clone(&node_metrics),
    );
    engine.ensure_genesis().context("chain handshake failed")?;

    let app_state = api::AppState {
        version: format!(
            "{} (app protocol {})",
            env!("CARGO_PKG_VERSION"),
            kestrel_protocol::config::APP_PROTOCOL_VERSION,
        ),
        engine: engine.clone(),
        commit_timeout: Duration::from_millis(args.commit_timeout_ms),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    let outcome = tokio::select! {
        res = engine.run() => match res {
            Err(e) => Err(anyhow::Error::new(e).context("block production halted")),
            Ok(()) => Err(anyhow::anyhow!("block producer exited")),
        },
        res = axum::serve(api_listener, api_router) => {
            res.context("API server error")
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            res.context("metrics server error")
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
            Ok(())
        }
    };

    if let Err(e) = &outcome {
        tracing::error!("kestrel-node stopping: {:#}", e);
    } else {
        tracing::info!("kestrel-node stopped");
    }
    outcome
}

/// Prints a fresh keypair. The secret key goes to stdout, so redirect with
/// care.
fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let keypair = LedgerKeypair::generate();
    let public_key = keypair.public_key_hex();
    let secret_key = hex::encode(keypair.secret_key_bytes());

    if args.json {
        let doc = serde_json::json!({
            "public_key": public_key,
            "secret_key": secret_key,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        println!("public key : {}", public_key);
        println!("secret key : {}", secret_key);
    }
    Ok(())
}

fn print_version() {
    println!("kestrel-node {}", env!("CARGO_PKG_VERSION"));
    println!(
        "app         {} {} (protocol {})",
        kestrel_protocol::config::APP_NAME,
        kestrel_protocol::config::APP_VERSION,
        kestrel_protocol::config::APP_PROTOCOL_VERSION,
    );
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
