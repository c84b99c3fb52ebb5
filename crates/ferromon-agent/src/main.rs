mod config;
mod report;
mod snapshot;

use anyhow::Result;
use chrono::Duration as ChronoDuration;
use clap::Parser;
use ferromon_alert::AlertManager;
use ferromon_collector::{system_collectors, SystemSource};
use ferromon_store::MetricStore;
use std::sync::Arc;
use tokio::signal;
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use config::AgentConfig;
use report::Reporter;

/// How often the local store is swept for expired entries.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
#[command(name = "ferromon-agent", about = "Host metrics collection agent")]
struct Args {
    /// Server base URL to report metrics to [default: http://localhost:8080]
    #[arg(long)]
    server: Option<String>,
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ferromon=info".parse()?))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };
    let server_url = args
        .server
        .clone()
        .or_else(|| config.server_url.clone())
        .unwrap_or_else(|| "http://localhost:8080".to_string());

    let agent_id = uuid::Uuid::new_v4().to_string();
    let hostname = SystemSource::hostname()?;
    tracing::info!(agent_id = %agent_id, hostname = %hostname, server = %server_url, "ferromon-agent starting");

    let alerts = AlertManager::default();
    let mut collectors = system_collectors(config.collectors.clone(), alerts.clone());
    let store = Arc::new(MetricStore::new(ChronoDuration::minutes(
        config.retention_minutes,
    )));
    let reporter = Reporter::new(&server_url);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutting down gracefully");
                shutdown.cancel();
            }
        });
    }

    // Retention sweep runs on its own cadence so the buffer shrinks even
    // when collection stalls.
    {
        let store = store.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut tick = interval(PURGE_INTERVAL);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        store.purge_expired();
                    }
                    _ = shutdown.cancelled() => break,
                }
            }
        });
    }

    let mut tick = interval(Duration::from_secs(config.collect_interval_secs));
    tracing::info!(
        interval_secs = config.collect_interval_secs,
        retention_minutes = config.retention_minutes,
        "Starting collection loop"
    );

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let mut batch = Vec::new();
                for collector in &mut collectors {
                    match collector.collect().await {
                        Ok(metrics) => batch.extend(metrics),
                        Err(e) => {
                            tracing::error!(collector = collector.name(), error = %e, "Collection failed")
                        }
                    }
                }
                tracing::debug!(count = batch.len(), "Collected metrics");

                for alert in alerts.drain() {
                    tracing::warn!(
                        source = %alert.source,
                        level = %alert.level,
                        "{}", alert.message
                    );
                }

                let snapshot = snapshot::assemble(&agent_id, &hostname, &batch);
                store.insert(batch);

                if let Err(e) = reporter.push(&snapshot).await {
                    tracing::warn!(error = %e, "Failed to report snapshot");
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }

    Ok(())
}
