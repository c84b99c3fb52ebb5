//! Per-resource metric collectors for the ferromon agent.
//!
//! The set of resource domains is closed and known at compile time, so
//! dispatch goes through the [`ResourceCollector`] enum rather than trait
//! objects. Collectors read counters through the seam traits in
//! [`source`], queue threshold alerts on a shared [`AlertManager`], and
//! return normalized [`Metric`] batches.

pub mod cpu;
pub mod disk;
pub mod memory;
pub mod source;

#[cfg(test)]
mod tests;

use anyhow::Result;
use ferromon_alert::AlertManager;
use ferromon_common::Metric;
use serde::Deserialize;
use std::sync::Arc;

pub use cpu::{CpuCollector, CpuConfig};
pub use disk::{DiskCollector, DiskConfig};
pub use memory::{MemoryCollector, MemoryConfig};
pub use source::SystemSource;

/// Configuration for all resource collectors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub cpu: CpuConfig,
    pub memory: MemoryConfig,
    pub disk: DiskConfig,
}

/// One collector for one resource domain.
pub enum ResourceCollector {
    Cpu(CpuCollector),
    Memory(MemoryCollector),
    Disk(DiskCollector),
}

impl ResourceCollector {
    pub fn name(&self) -> &'static str {
        match self {
            ResourceCollector::Cpu(_) => "cpu",
            ResourceCollector::Memory(_) => "memory",
            ResourceCollector::Disk(_) => "disk",
        }
    }

    /// Runs one collection pass for this domain.
    ///
    /// An `Err` means the whole domain failed this pass; partial failures
    /// inside a domain surface as alerts instead.
    pub async fn collect(&mut self) -> Result<Vec<Metric>> {
        match self {
            ResourceCollector::Cpu(c) => c.collect().await,
            ResourceCollector::Memory(c) => c.collect().await,
            ResourceCollector::Disk(c) => c.collect().await,
        }
    }
}

/// Builds the full collector set backed by the live system.
pub fn system_collectors(config: CollectorConfig, alerts: AlertManager) -> Vec<ResourceCollector> {
    let source = Arc::new(SystemSource::new());
    vec![
        ResourceCollector::Cpu(CpuCollector::new(
            source.clone(),
            config.cpu,
            alerts.clone(),
        )),
        ResourceCollector::Memory(MemoryCollector::new(
            source.clone(),
            config.memory,
            alerts.clone(),
        )),
        ResourceCollector::Disk(DiskCollector::new(source, config.disk, alerts)),
    ]
}
