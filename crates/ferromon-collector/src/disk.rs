//! Disk collector: per-partition usage plus I/O throughput rates.
//!
//! Byte and op counters are cumulative, so rates need two observations.
//! The first pass only seeds the previous-counter map and emits no rate
//! metrics; a pass with no elapsed time is likewise suppressed.

use anyhow::{Context, Result};
use chrono::Utc;
use ferromon_alert::AlertManager;
use ferromon_common::{Alert, AlertLevel, Metric, METRIC_DISK_USAGE};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::source::{DiskSource, IoCounters, PartitionUsage};

/// Filesystem types that carry no capacity signal worth reporting.
const SKIP_FSTYPES: &[&str] = &[
    "tmpfs", "devtmpfs", "devfs", "overlay", "squashfs", "proc", "sysfs", "cgroup", "cgroup2",
    "debugfs", "tracefs", "ramfs", "autofs", "mqueue", "hugetlbfs", "fusectl", "configfs",
    "securityfs", "pstore", "binfmt_misc",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiskConfig {
    /// Filesystem types excluded from collection.
    pub skip_fstypes: Vec<String>,
    /// Usage percentage above which a warning is raised.
    pub usage_warning: f64,
    /// Usage percentage above which a critical alert is raised.
    pub usage_critical: f64,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            skip_fstypes: SKIP_FSTYPES.iter().map(|s| s.to_string()).collect(),
            usage_warning: 80.0,
            usage_critical: 90.0,
        }
    }
}

pub struct DiskCollector {
    source: Arc<dyn DiskSource>,
    config: DiskConfig,
    alerts: AlertManager,
    prev_counters: HashMap<String, IoCounters>,
    last_check: Option<Instant>,
}

impl DiskCollector {
    pub fn new(source: Arc<dyn DiskSource>, config: DiskConfig, alerts: AlertManager) -> Self {
        Self {
            source,
            config,
            alerts,
            prev_counters: HashMap::new(),
            last_check: None,
        }
    }

    pub async fn collect(&mut self) -> Result<Vec<Metric>> {
        let source = self.source.clone();
        let (partitions, counters) = tokio::task::spawn_blocking(move || {
            let partitions = source.partitions()?;
            let counters = source.io_counters()?;
            Ok::<_, anyhow::Error>((partitions, counters))
        })
        .await
        .context("disk collection task panicked")??;

        let now = Utc::now();
        let mut batch = Vec::new();

        for p in &partitions {
            if self.config.skip_fstypes.iter().any(|f| f == &p.fstype) {
                continue;
            }
            batch.push(labelled(
                Metric::new(METRIC_DISK_USAGE, p.used_percent, now),
                p,
            ));
            batch.push(labelled(Metric::new("disk_total", p.total as f64, now), p));
            batch.push(labelled(Metric::new("disk_free", p.free as f64, now), p));
            self.check_usage(p);
        }

        for (device, cur) in &counters {
            batch.push(
                Metric::new("disk_read_bytes_total", cur.read_bytes as f64, now)
                    .with_label("device", device.clone()),
            );
            batch.push(
                Metric::new("disk_write_bytes_total", cur.write_bytes as f64, now)
                    .with_label("device", device.clone()),
            );
        }

        let elapsed = self
            .last_check
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        if self.last_check.is_some() {
            for (device, rates) in compute_io_rates(&self.prev_counters, &counters, elapsed) {
                for (name, value) in rates {
                    batch.push(Metric::new(name, value, now).with_label("device", device.clone()));
                }
            }
        }

        self.prev_counters = counters;
        self.last_check = Some(Instant::now());
        Ok(batch)
    }

    fn check_usage(&self, p: &PartitionUsage) {
        if p.used_percent > self.config.usage_critical {
            self.alerts.add(Alert {
                source: METRIC_DISK_USAGE.to_string(),
                level: AlertLevel::Critical,
                message: format!(
                    "Critical disk usage on {}: {:.2}%",
                    p.mountpoint, p.used_percent
                ),
                timestamp: Utc::now(),
            });
        } else if p.used_percent > self.config.usage_warning {
            self.alerts.warn(
                METRIC_DISK_USAGE,
                format!("High disk usage on {}: {:.2}%", p.mountpoint, p.used_percent),
            );
        }
    }
}

fn labelled(metric: Metric, p: &PartitionUsage) -> Metric {
    metric
        .with_label("device", p.device.clone())
        .with_label("mountpoint", p.mountpoint.clone())
        .with_label("fstype", p.fstype.clone())
}

/// Per-device throughput rates between two counter observations.
///
/// Devices absent from `prev` (hotplugged since the last pass) and passes
/// with no elapsed time yield no rates. A counter that went backwards is
/// treated as a reset and skipped for that pass. IOPS rates are emitted
/// only when the platform actually reports op counts.
pub(crate) fn compute_io_rates(
    prev: &HashMap<String, IoCounters>,
    cur: &HashMap<String, IoCounters>,
    elapsed_secs: f64,
) -> Vec<(String, Vec<(&'static str, f64)>)> {
    if elapsed_secs <= 0.0 {
        return Vec::new();
    }

    let mut out = Vec::new();
    for (device, cur_c) in cur {
        let Some(prev_c) = prev.get(device) else {
            continue;
        };
        if cur_c.read_bytes < prev_c.read_bytes || cur_c.write_bytes < prev_c.write_bytes {
            continue;
        }

        let mut rates = vec![
            (
                "disk_read_rate",
                (cur_c.read_bytes - prev_c.read_bytes) as f64 / elapsed_secs,
            ),
            (
                "disk_write_rate",
                (cur_c.write_bytes - prev_c.write_bytes) as f64 / elapsed_secs,
            ),
        ];

        let has_ops =
            (cur_c.read_ops | cur_c.write_ops | prev_c.read_ops | prev_c.write_ops) != 0;
        if has_ops && cur_c.read_ops >= prev_c.read_ops && cur_c.write_ops >= prev_c.write_ops {
            rates.push((
                "disk_iops_read",
                (cur_c.read_ops - prev_c.read_ops) as f64 / elapsed_secs,
            ));
            rates.push((
                "disk_iops_write",
                (cur_c.write_ops - prev_c.write_ops) as f64 / elapsed_secs,
            ));
        }

        out.push((device.clone(), rates));
    }
    out
}
