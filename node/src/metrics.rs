//! # Prometheus Metrics
//!
//! Operational metrics for the devnet node, scraped at `/metrics` on the
//! configured metrics port.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] with the
//! `kestrel` namespace so they never collide with the default registry.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Metric handles. Prometheus handles are internally reference counted, so
/// cloning shares the underlying series.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Blocks that went through FinalizeBlock + Commit.
    pub blocks_finalized_total: IntCounter,
    /// Transactions executed in committed blocks, successful or not.
    pub transactions_processed_total: IntCounter,
    /// Executed transactions that came back with a non-zero code.
    pub transactions_failed_total: IntCounter,
    /// Submissions refused by CheckTx or by the mempool itself.
    pub transactions_rejected_total: IntCounter,
    /// Admitted transactions lost because their block failed.
    pub transactions_dropped_total: IntCounter,
    pub transactions_in_mempool: IntGauge,
    /// Height of the last committed block.
    pub block_height: IntGauge,
    /// Wall time of FinalizeBlock + Commit for one block.
    pub finalize_latency_seconds: Histogram,
}

fn register_counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("metric creation");
    registry
        .register(Box::new(counter.clone()))
        .expect("metric registration");
    counter
}

fn register_gauge(registry: &Registry, name: &str, help: &str) -> IntGauge {
    let gauge = IntGauge::new(name, help).expect("metric creation");
    registry
        .register(Box::new(gauge.clone()))
        .expect("metric registration");
    gauge
}

impl NodeMetrics {
    /// Create and register every metric. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("kestrel".into()), None)
            .expect("failed to create prometheus registry");

        let blocks_finalized_total = register_counter(
            &registry,
            "blocks_finalized_total",
            "Total number of blocks finalized and committed",
        );
        let transactions_processed_total = register_counter(
            &registry,
            "transactions_processed_total",
            "Total number of transactions executed in committed blocks",
        );
        let transactions_failed_total = register_counter(
            &registry,
            "transactions_failed_total",
            "Executed transactions that returned a non-zero result code",
        );
        let transactions_rejected_total = register_counter(
            &registry,
            "transactions_rejected_total",
            "Transactions rejected by the admission check or a full mempool",
        );
        let transactions_dropped_total = register_counter(
            &registry,
            "transactions_dropped_total",
            "Drained transactions lost to a failed block",
        );
        let transactions_in_mempool = register_gauge(
            &registry,
            "transactions_in_mempool",
            "Current number of admitted transactions awaiting a block",
        );
        let block_height = register_gauge(
            &registry,
            "block_height",
            "Height of the latest committed block",
        );

        let finalize_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "finalize_latency_seconds",
                "Time to finalize and commit one block, in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(finalize_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            blocks_finalized_total,
            transactions_processed_total,
            transactions_failed_total,
            transactions_rejected_total,
            transactions_dropped_total,
            transactions_in_mempool,
            block_height,
            finalize_latency_seconds,
        }
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedMetrics = Arc<NodeMetrics>;

/// `GET /metrics`
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
