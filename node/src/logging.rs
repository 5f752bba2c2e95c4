//! # Structured Logging
//!
//! One global `tracing` subscriber per process: an `EnvFilter` followed by a
//! single `fmt` layer whose shape depends on [`LogFormat`]. `RUST_LOG`, when
//! set and valid, overrides the `--log-level` directive.
//!
//! Node logs go to stderr. stdout stays clean for `keygen` output.

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable output with source locations, for local runs.
    Pretty,
    /// One JSON object per event, for log shippers.
    Json,
}

/// Where the active filter came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterSource {
    Environment,
    CommandLine,
}

fn node_filter(cli_directive: &str) -> Result<(EnvFilter, FilterSource)> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok((filter, FilterSource::Environment));
    }
    let filter = EnvFilter::try_new(cli_directive)
        .with_context(|| format!("invalid log filter {:?}", cli_directive))?;
    Ok((filter, FilterSource::CommandLine))
}

/// The event formatter for `format`, writing to `writer`.
fn event_layer<S, W>(format: LogFormat, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer().with_writer(writer).with_target(true);
    match format {
        LogFormat::Pretty => Box::new(base.with_file(true).with_line_number(true)),
        LogFormat::Json => Box::new(base.json().with_current_span(false)),
    }
}

/// Install the process-wide subscriber. Fails if `cli_directive` does not
/// parse or a subscriber is already installed.
pub fn init_logging(cli_directive: &str, format: LogFormat) -> Result<()> {
    let (filter, source) = node_filter(cli_directive)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(event_layer(format, std::io::stderr))
        .try_init()
        .context("failed to install the tracing subscriber")?;

    tracing::debug!(?format, ?source, "logging ready");
    Ok(())
}
