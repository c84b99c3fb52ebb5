//! CPU collector: usage, core frequency, and load averages.
//!
//! The three sub-collections run concurrently on the blocking pool and
//! report back over channels. A failed sub-collection raises one warning
//! alert and the remaining results are still merged, so a broken counter
//! never takes down the whole sample.

use anyhow::Result;
use chrono::{DateTime, Utc};
use ferromon_alert::{AlertManager, LoadTrend, RollingHistory};
use ferromon_common::{
    Metric, METRIC_CPU_FREQUENCY, METRIC_CPU_USAGE, METRIC_LOAD_1, METRIC_LOAD_15, METRIC_LOAD_5,
    METRIC_LOAD_PER_CPU,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::source::CpuSource;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    /// Emit per-core frequency metrics.
    pub collect_frequency: bool,
    /// Emit load average metrics.
    pub collect_load: bool,
    /// Number of normalized load samples kept for trend detection.
    pub history_size: usize,
    /// Per-core usage percentage above which a warning is raised.
    pub usage_threshold: f64,
    /// Normalized load (load1 / logical cores) above which a warning is
    /// raised.
    pub load_threshold: f64,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            collect_frequency: true,
            collect_load: true,
            history_size: 60,
            usage_threshold: 90.0,
            load_threshold: 1.5,
        }
    }
}

pub struct CpuCollector {
    source: Arc<dyn CpuSource>,
    config: CpuConfig,
    alerts: AlertManager,
    load_history: RollingHistory,
}

impl CpuCollector {
    pub fn new(source: Arc<dyn CpuSource>, config: CpuConfig, alerts: AlertManager) -> Self {
        let history_size = config.history_size.max(2);
        Self {
            source,
            config,
            alerts,
            load_history: RollingHistory::new(history_size),
        }
    }

    /// Trend of the normalized load over the rolling history.
    pub fn load_trend(&self) -> LoadTrend {
        self.load_history.trend()
    }

    /// Runs the enabled sub-collections concurrently and merges their
    /// results. Each failed sub-collection contributes one warning alert
    /// instead of failing the merge.
    pub async fn collect(&mut self) -> Result<Vec<Metric>> {
        // One logical timestamp for the whole pass; the usage sample
        // blocks for its interval, so stamping inside each sub-collection
        // would skew metrics within a pass apart.
        let now = Utc::now();
        let (metrics_tx, mut metrics_rx) = mpsc::unbounded_channel::<Vec<Metric>>();
        let (errors_tx, mut errors_rx) = mpsc::unbounded_channel::<(&'static str, anyhow::Error)>();

        let mut pending = 0usize;

        {
            let source = self.source.clone();
            let metrics_tx = metrics_tx.clone();
            let errors_tx = errors_tx.clone();
            tokio::task::spawn_blocking(move || match collect_usage(source.as_ref(), now) {
                Ok(batch) => {
                    let _ = metrics_tx.send(batch);
                }
                Err(err) => {
                    let _ = errors_tx.send((METRIC_CPU_USAGE, err));
                }
            });
            pending += 1;
        }

        if self.config.collect_frequency {
            let source = self.source.clone();
            let metrics_tx = metrics_tx.clone();
            let errors_tx = errors_tx.clone();
            tokio::task::spawn_blocking(move || match collect_frequency(source.as_ref(), now) {
                Ok(batch) => {
                    let _ = metrics_tx.send(batch);
                }
                Err(err) => {
                    let _ = errors_tx.send((METRIC_CPU_FREQUENCY, err));
                }
            });
            pending += 1;
        }

        if self.config.collect_load {
            let source = self.source.clone();
            let metrics_tx = metrics_tx.clone();
            let errors_tx = errors_tx.clone();
            tokio::task::spawn_blocking(move || match collect_load(source.as_ref(), now) {
                Ok(batch) => {
                    let _ = metrics_tx.send(batch);
                }
                Err(err) => {
                    let _ = errors_tx.send(("system_load", err));
                }
            });
            pending += 1;
        }

        drop(metrics_tx);
        drop(errors_tx);

        let mut merged = Vec::new();
        while pending > 0 {
            tokio::select! {
                Some(batch) = metrics_rx.recv() => {
                    merged.extend(batch);
                    pending -= 1;
                }
                Some((source, err)) = errors_rx.recv() => {
                    tracing::warn!(source, error = %err, "CPU sub-collection failed");
                    self.alerts.warn(source, format!("Collection error: {err:#}"));
                    pending -= 1;
                }
                else => break,
            }
        }

        self.evaluate(&merged);
        Ok(merged)
    }

    /// Threshold checks and trend bookkeeping over a merged sample.
    fn evaluate(&mut self, metrics: &[Metric]) {
        for m in metrics {
            match m.name.as_str() {
                METRIC_CPU_USAGE => {
                    if m.labels.get("type").is_some_and(|t| t == "core")
                        && m.value > self.config.usage_threshold
                    {
                        let core = m.labels.get("core").map(String::as_str).unwrap_or("?");
                        self.alerts.warn(
                            METRIC_CPU_USAGE,
                            format!("High CPU usage on core {core}: {:.2}%", m.value),
                        );
                    }
                }
                METRIC_LOAD_PER_CPU => {
                    self.load_history.push(m.value);
                    if m.value > self.config.load_threshold {
                        self.alerts.warn(
                            "system_load",
                            format!("High system load: {:.2} per CPU", m.value),
                        );
                    }
                }
                _ => {}
            }
        }
    }
}

fn collect_usage(source: &dyn CpuSource, now: DateTime<Utc>) -> Result<Vec<Metric>> {
    let usage = source.usage()?;
    let mut batch = Vec::with_capacity(usage.per_core.len() + 1);
    batch.push(Metric::new(METRIC_CPU_USAGE, usage.total, now).with_label("type", "total"));
    for (core, value) in usage.per_core.iter().enumerate() {
        batch.push(
            Metric::new(METRIC_CPU_USAGE, *value, now)
                .with_label("type", "core")
                .with_label("core", core.to_string()),
        );
    }
    Ok(batch)
}

fn collect_frequency(source: &dyn CpuSource, now: DateTime<Utc>) -> Result<Vec<Metric>> {
    let cores = source.core_info()?;
    Ok(cores
        .into_iter()
        .map(|info| {
            Metric::new(METRIC_CPU_FREQUENCY, info.frequency_mhz, now)
                .with_label("core", info.core.to_string())
                .with_label("model", info.model)
                .with_label("vendor", info.vendor)
        })
        .collect())
}

fn collect_load(source: &dyn CpuSource, now: DateTime<Utc>) -> Result<Vec<Metric>> {
    let load = source.load_average()?;
    let mut batch = vec![
        Metric::new(METRIC_LOAD_1, load.one, now).with_label("period", "1min"),
        Metric::new(METRIC_LOAD_5, load.five, now).with_label("period", "5min"),
        Metric::new(METRIC_LOAD_15, load.fifteen, now).with_label("period", "15min"),
    ];
    if load.logical_cores > 0 {
        batch.push(
            Metric::new(METRIC_LOAD_PER_CPU, load.one / load.logical_cores as f64, now)
                .with_label("period", "1min"),
        );
    }
    Ok(batch)
}
