//! Memory collector: virtual memory and swap.
//!
//! Virtual memory counters are required; a host without swap (or whose
//! swap counters cannot be read) still yields a full sample.

use anyhow::{Context, Result};
use chrono::Utc;
use ferromon_alert::AlertManager;
use ferromon_common::{Metric, METRIC_MEMORY_USAGE};
use serde::Deserialize;
use std::sync::Arc;

use crate::source::MemorySource;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Virtual memory usage percentage above which a warning is raised.
    pub usage_threshold: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            usage_threshold: 90.0,
        }
    }
}

pub struct MemoryCollector {
    source: Arc<dyn MemorySource>,
    config: MemoryConfig,
    alerts: AlertManager,
}

impl MemoryCollector {
    pub fn new(source: Arc<dyn MemorySource>, config: MemoryConfig, alerts: AlertManager) -> Self {
        Self {
            source,
            config,
            alerts,
        }
    }

    pub async fn collect(&mut self) -> Result<Vec<Metric>> {
        let source = self.source.clone();
        let (vm, swap) = tokio::task::spawn_blocking(move || {
            let vm = source.virtual_memory()?;
            // Swap counters are optional twice over: absent swap yields
            // None, and a failed read degrades to None instead of
            // discarding the virtual-memory sample.
            let swap = match source.swap_memory() {
                Ok(swap) => swap,
                Err(err) => {
                    tracing::warn!(error = %err, "Swap read failed, omitting swap metrics");
                    None
                }
            };
            Ok::<_, anyhow::Error>((vm, swap))
        })
        .await
        .context("memory collection task panicked")??;

        let now = Utc::now();
        let mut batch = vec![
            Metric::new(METRIC_MEMORY_USAGE, vm.used_percent, now).with_label("type", "virtual"),
            Metric::new("memory_total", vm.total as f64, now).with_label("type", "virtual"),
            Metric::new("memory_used", vm.used as f64, now).with_label("type", "virtual"),
            Metric::new("memory_free", vm.free as f64, now).with_label("type", "virtual"),
            Metric::new("memory_available", vm.available as f64, now).with_label("type", "virtual"),
        ];

        if let Some(swap) = swap {
            batch.push(
                Metric::new(METRIC_MEMORY_USAGE, swap.used_percent, now)
                    .with_label("type", "swap"),
            );
            batch.push(Metric::new("memory_total", swap.total as f64, now).with_label("type", "swap"));
            batch.push(Metric::new("memory_used", swap.used as f64, now).with_label("type", "swap"));
        }

        if vm.used_percent > self.config.usage_threshold {
            self.alerts.warn(
                METRIC_MEMORY_USAGE,
                format!("High memory usage: {:.2}%", vm.used_percent),
            );
        }

        Ok(batch)
    }
}
