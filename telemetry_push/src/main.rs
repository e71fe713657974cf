//! Telemetry Push
//!
//! Collects metrics from the configured sources once, and pushes them to a
//! Prometheus remote write endpoint.

mod config;

use anyhow::{Context, Result}; // alias std::result::Result with dynamic error type
use chrono::prelude::*;

use telemetry_core::source;
use telemetry_remote_write::{Client, PushError, PushSummary};

use crate::config::Config;

/// The program's main entry point.
fn main() -> Result<()> {
    // Load configuration from arguments, environment variables and `.env`
    let config = Config::load()?;

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(if config.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    async_std::task::block_on(run(config))
}

/// Collect from every source, then push everything as one write request
async fn run(config: Config) -> Result<()> {
    let client = Client::new(&config.remote_write).context("configuring remote write")?;

    let sources = config.sources();
    if sources.is_empty() {
        tracing::warn!("no metric sources are enabled");
    }
    let groups = source::collect_all(&sources).await;
    let collected_at = Utc::now();

    if config.dry_run {
        let prepared = client
            .prepare(&groups, collected_at)
            .map_err(push_error)?;
        println!("{}", dry_run_outcome(&prepared.summary));
        return Ok(());
    }

    let summary = client
        .push(&groups, collected_at)
        .await
        .map_err(push_error)
        .with_context(|| format!("push to {} failed", config.remote_write.url))?;
    tracing::info!(
        "remote write accepted {} series ({} bytes compressed)",
        summary.series,
        summary.compressed_bytes
    );
    println!("{}", outcome(&summary));
    Ok(())
}

/// Keeps the error's cause chain, labelled with its kind (e.g. "transport error")
fn push_error(err: PushError) -> anyhow::Error {
    let kind = err.kind();
    anyhow::Error::new(err).context(format!("{} error", kind))
}

/// The line reported after a successful push
fn outcome(summary: &PushSummary) -> String {
    if summary.series == 0 {
        "pushed 0 metrics (nothing collected)".to_string()
    } else {
        format!("pushed {} metrics", summary.series)
    }
}

fn dry_run_outcome(summary: &PushSummary) -> String {
    format!(
        "Dry run: {} metrics ({} bytes, {} compressed)",
        summary.series, summary.encoded_bytes, summary.compressed_bytes
    )
}
