use anyhow::Result;
use chrono::Duration as ChronoDuration;
use clap::Parser;
use ferromon_server::app;
use ferromon_server::config::ServerConfig;
use ferromon_server::state::AppState;
use tokio::signal;
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ferromon-server", about = "Central metrics collection server")]
struct Args {
    /// Port to listen on (overrides the config file).
    #[arg(long)]
    port: Option<u16>,
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
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    let port = args.port.unwrap_or(config.port);

    let app_state = AppState::new(ChronoDuration::minutes(config.retention_minutes));
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

    spawn_reaper(&app_state, &config, shutdown.clone());
    spawn_store_sweeper(&app_state, shutdown.clone());

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "ferromon-server listening");

    let router = app::build_app(app_state);
    axum::serve(listener, router)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.cancelled().await }
        })
        .await?;

    Ok(())
}

/// Periodically drops agents that have stopped pushing.
fn spawn_reaper(app_state: &AppState, config: &ServerConfig, shutdown: CancellationToken) {
    let registry = app_state.registry.clone();
    let reap_interval = Duration::from_secs(config.reap_interval_secs);
    let threshold = ChronoDuration::seconds(config.liveness_threshold_secs);
    tokio::spawn(async move {
        let mut tick = interval(reap_interval);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let removed = registry
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .reap(threshold);
                    if removed > 0 {
                        tracing::info!(removed, "Reaped stale agents");
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }
    });
}

/// Periodically evicts expired entries from the metric store so retention
/// holds even when no agent is pushing.
fn spawn_store_sweeper(app_state: &AppState, shutdown: CancellationToken) {
    let store = app_state.store.clone();
    tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(60));
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
