//! The seam between collectors and the operating system.
//!
//! Each resource domain gets one trait with the signature "read current
//! counters, fail or succeed atomically". Collectors only ever see these
//! traits, so tests can inject deterministic sources and never touch the
//! host. [`SystemSource`] is the production implementation backed by
//! `sysinfo`.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};

/// One CPU usage sample: total plus per-core percentages.
#[derive(Debug, Clone)]
pub struct CpuUsage {
    pub total: f64,
    pub per_core: Vec<f64>,
}

/// Static per-core information (frequency and identification).
#[derive(Debug, Clone)]
pub struct CoreInfo {
    pub core: usize,
    pub frequency_mhz: f64,
    pub model: String,
    pub vendor: String,
}

/// System load averages plus the logical core count used to normalize them.
#[derive(Debug, Clone)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
    pub logical_cores: usize,
}

#[derive(Debug, Clone)]
pub struct VirtualMemory {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub available: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone)]
pub struct SwapMemory {
    pub total: u64,
    pub used: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone)]
pub struct PartitionUsage {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
    pub total: u64,
    pub free: u64,
    pub used_percent: f64,
}

/// Cumulative I/O counters for one device.
///
/// Op counts are zero on platforms where the source cannot observe them;
/// rate computation skips IOPS metrics in that case.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IoCounters {
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_ops: u64,
    pub write_ops: u64,
}

/// CPU counter access.
pub trait CpuSource: Send + Sync {
    /// Measures usage over the sampling interval. Blocks for that interval.
    fn usage(&self) -> Result<CpuUsage>;

    fn core_info(&self) -> Result<Vec<CoreInfo>>;

    fn load_average(&self) -> Result<LoadAverage>;
}

/// Memory counter access.
pub trait MemorySource: Send + Sync {
    fn virtual_memory(&self) -> Result<VirtualMemory>;

    /// `Ok(None)` when the host has no swap configured.
    fn swap_memory(&self) -> Result<Option<SwapMemory>>;
}

/// Disk counter access.
pub trait DiskSource: Send + Sync {
    fn partitions(&self) -> Result<Vec<PartitionUsage>>;

    /// Cumulative I/O counters keyed by device name.
    fn io_counters(&self) -> Result<HashMap<String, IoCounters>>;
}

/// Production source reading counters via `sysinfo`.
pub struct SystemSource {
    system: Mutex<System>,
    disks: Mutex<Disks>,
}

impl SystemSource {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
            disks: Mutex::new(Disks::new_with_refreshed_list()),
        }
    }

    pub fn hostname() -> Result<String> {
        System::host_name().context("failed to determine hostname")
    }

    fn lock_system(&self) -> std::sync::MutexGuard<'_, System> {
        self.system
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SystemSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuSource for SystemSource {
    fn usage(&self) -> Result<CpuUsage> {
        // Usage is a delta between two refreshes; the sleep is the
        // sampling interval, an intentional blocking wait.
        {
            let mut system = self.lock_system();
            system.refresh_cpu_usage();
        }
        std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
        let mut system = self.lock_system();
        system.refresh_cpu_usage();

        Ok(CpuUsage {
            total: system.global_cpu_usage() as f64,
            per_core: system.cpus().iter().map(|c| c.cpu_usage() as f64).collect(),
        })
    }

    fn core_info(&self) -> Result<Vec<CoreInfo>> {
        let system = self.lock_system();
        Ok(system
            .cpus()
            .iter()
            .enumerate()
            .map(|(i, cpu)| CoreInfo {
                core: i,
                frequency_mhz: cpu.frequency() as f64,
                model: cpu.brand().to_string(),
                vendor: cpu.vendor_id().to_string(),
            })
            .collect())
    }

    fn load_average(&self) -> Result<LoadAverage> {
        let load = System::load_average();
        let logical_cores = self.lock_system().cpus().len();
        Ok(LoadAverage {
            one: load.one,
            five: load.five,
            fifteen: load.fifteen,
            logical_cores,
        })
    }
}

impl MemorySource for SystemSource {
    fn virtual_memory(&self) -> Result<VirtualMemory> {
        let mut system = self.lock_system();
        system.refresh_memory();

        let total = system.total_memory();
        let used = system.used_memory();
        let used_percent = if total > 0 {
            (used as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        Ok(VirtualMemory {
            total,
            used,
            free: system.free_memory(),
            available: system.available_memory(),
            used_percent,
        })
    }

    fn swap_memory(&self) -> Result<Option<SwapMemory>> {
        let system = self.lock_system();
        let total = system.total_swap();
        if total == 0 {
            return Ok(None);
        }
        let used = system.used_swap();
        Ok(Some(SwapMemory {
            total,
            used,
            used_percent: (used as f64 / total as f64) * 100.0,
        }))
    }
}

impl DiskSource for SystemSource {
    fn partitions(&self) -> Result<Vec<PartitionUsage>> {
        let mut disks = self
            .disks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        disks.refresh(true);

        Ok(disks
            .iter()
            .map(|disk| {
                let total = disk.total_space();
                let free = disk.available_space();
                let used = total.saturating_sub(free);
                let used_percent = if total > 0 {
                    (used as f64 / total as f64) * 100.0
                } else {
                    0.0
                };
                PartitionUsage {
                    device: disk.name().to_string_lossy().to_string(),
                    mountpoint: disk.mount_point().to_string_lossy().to_string(),
                    fstype: disk.file_system().to_string_lossy().to_string(),
                    total,
                    free,
                    used_percent,
                }
            })
            .collect())
    }

    fn io_counters(&self) -> Result<HashMap<String, IoCounters>> {
        let mut disks = self
            .disks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        disks.refresh(true);

        // sysinfo exposes cumulative byte counters but no op counts.
        Ok(disks
            .iter()
            .map(|disk| {
                let usage = disk.usage();
                (
                    disk.name().to_string_lossy().to_string(),
                    IoCounters {
                        read_bytes: usage.total_read_bytes,
                        write_bytes: usage.total_written_bytes,
                        read_ops: 0,
                        write_ops: 0,
                    },
                )
            })
            .collect())
    }
}
