use crate::cpu::{CpuCollector, CpuConfig};
use crate::disk::{compute_io_rates, DiskCollector, DiskConfig};
use crate::memory::{MemoryCollector, MemoryConfig};
use crate::source::{
    CoreInfo, CpuSource, CpuUsage, DiskSource, IoCounters, LoadAverage, MemorySource,
    PartitionUsage, SwapMemory, VirtualMemory,
};
use anyhow::{anyhow, Result};
use ferromon_alert::{AlertManager, LoadTrend};
use ferromon_common::{AlertLevel, Metric};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct MockCpu {
    usage: CpuUsage,
    cores: Vec<CoreInfo>,
    load: Arc<Mutex<LoadAverage>>,
    fail_load: bool,
}

impl MockCpu {
    fn new(per_core: Vec<f64>, load1: f64) -> Self {
        let total = per_core.iter().sum::<f64>() / per_core.len() as f64;
        let cores = per_core
            .iter()
            .enumerate()
            .map(|(i, _)| CoreInfo {
                core: i,
                frequency_mhz: 2400.0,
                model: "mock".to_string(),
                vendor: "mockvendor".to_string(),
            })
            .collect();
        let logical_cores = per_core.len();
        Self {
            usage: CpuUsage { total, per_core },
            cores,
            load: Arc::new(Mutex::new(LoadAverage {
                one: load1,
                five: load1,
                fifteen: load1,
                logical_cores,
            })),
            fail_load: false,
        }
    }
}

impl CpuSource for MockCpu {
    fn usage(&self) -> Result<CpuUsage> {
        Ok(self.usage.clone())
    }

    fn core_info(&self) -> Result<Vec<CoreInfo>> {
        Ok(self.cores.clone())
    }

    fn load_average(&self) -> Result<LoadAverage> {
        if self.fail_load {
            return Err(anyhow!("load counters unavailable"));
        }
        Ok(self.load.lock().unwrap().clone())
    }
}

struct MockMemory {
    used_percent: f64,
    swap: Option<SwapMemory>,
    fail_swap: bool,
}

impl MemorySource for MockMemory {
    fn virtual_memory(&self) -> Result<VirtualMemory> {
        let total = 16 * 1024 * 1024 * 1024u64;
        let used = (total as f64 * self.used_percent / 100.0) as u64;
        Ok(VirtualMemory {
            total,
            used,
            free: total - used,
            available: total - used,
            used_percent: self.used_percent,
        })
    }

    fn swap_memory(&self) -> Result<Option<SwapMemory>> {
        if self.fail_swap {
            return Err(anyhow!("swap counters unreadable"));
        }
        Ok(self.swap.clone())
    }
}

struct MockDisk {
    partitions: Vec<PartitionUsage>,
    counters: Arc<Mutex<HashMap<String, IoCounters>>>,
}

impl DiskSource for MockDisk {
    fn partitions(&self) -> Result<Vec<PartitionUsage>> {
        Ok(self.partitions.clone())
    }

    fn io_counters(&self) -> Result<HashMap<String, IoCounters>> {
        Ok(self.counters.lock().unwrap().clone())
    }
}

fn partition(device: &str, fstype: &str, used_percent: f64) -> PartitionUsage {
    PartitionUsage {
        device: device.to_string(),
        mountpoint: format!("/mnt/{device}"),
        fstype: fstype.to_string(),
        total: 100,
        free: 100 - used_percent as u64,
        used_percent,
    }
}

fn find<'a>(metrics: &'a [Metric], name: &str) -> Vec<&'a Metric> {
    metrics.iter().filter(|m| m.name == name).collect()
}

#[tokio::test]
async fn hot_core_yields_core_metric_and_warning_alert() {
    let alerts = AlertManager::default();
    let source = Arc::new(MockCpu::new(vec![92.0, 10.0], 0.5));
    let mut collector = CpuCollector::new(source, CpuConfig::default(), alerts.clone());

    let metrics = collector.collect().await.unwrap();

    let core0 = metrics
        .iter()
        .find(|m| {
            m.name == "cpu_usage"
                && m.labels.get("type").map(String::as_str) == Some("core")
                && m.labels.get("core").map(String::as_str) == Some("0")
        })
        .expect("core 0 metric present");
    assert_eq!(core0.value, 92.0);

    let queued = alerts.drain();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].level, AlertLevel::Warning);
    assert_eq!(queued[0].source, "cpu_usage");
    assert!(queued[0].message.contains("core 0"));
    assert!(queued[0].message.contains("92.00%"));
}

#[tokio::test]
async fn failed_load_sub_collection_raises_one_alert_and_keeps_other_metrics() {
    let alerts = AlertManager::default();
    let mut source = MockCpu::new(vec![10.0, 20.0], 0.5);
    source.fail_load = true;
    let mut collector = CpuCollector::new(Arc::new(source), CpuConfig::default(), alerts.clone());

    let metrics = collector.collect().await.unwrap();

    assert!(!find(&metrics, "cpu_usage").is_empty());
    assert!(!find(&metrics, "cpu_frequency").is_empty());
    assert!(find(&metrics, "system_load1").is_empty());

    let queued = alerts.drain();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].source, "system_load");
    assert!(queued[0].message.contains("Collection error"));
}

#[tokio::test]
async fn normalized_load_feeds_trend_history() {
    let alerts = AlertManager::default();
    let source = Arc::new(MockCpu::new(vec![10.0, 10.0], 0.2));
    let load = source.load.clone();
    let mut collector = CpuCollector::new(source, CpuConfig::default(), alerts.clone());

    assert_eq!(collector.load_trend(), LoadTrend::Insufficient);
    collector.collect().await.unwrap();
    load.lock().unwrap().one = 2.0; // 1.0 per cpu, +0.9 vs first sample
    collector.collect().await.unwrap();

    assert_eq!(collector.load_trend(), LoadTrend::IncreasingRapidly);
    // 1.0 per cpu is below the 1.5 threshold: trend moved, no load alert.
    assert!(alerts.drain().is_empty());
}

#[tokio::test]
async fn high_normalized_load_raises_alert() {
    let alerts = AlertManager::default();
    let source = Arc::new(MockCpu::new(vec![10.0, 10.0], 4.0)); // 2.0 per cpu
    let mut collector = CpuCollector::new(source, CpuConfig::default(), alerts.clone());

    collector.collect().await.unwrap();

    let queued = alerts.drain();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].source, "system_load");
    assert!(queued[0].message.contains("2.00 per CPU"));
}

#[tokio::test]
async fn memory_sample_is_complete_without_swap() {
    let alerts = AlertManager::default();
    let source = Arc::new(MockMemory {
        used_percent: 40.0,
        swap: None,
        fail_swap: false,
    });
    let mut collector = MemoryCollector::new(source, MemoryConfig::default(), alerts.clone());

    let metrics = collector.collect().await.unwrap();

    let usage = find(&metrics, "memory_usage");
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].labels.get("type").unwrap(), "virtual");
    assert!(alerts.drain().is_empty());
}

#[tokio::test]
async fn swap_read_failure_still_yields_virtual_memory_metrics() {
    let alerts = AlertManager::default();
    let source = Arc::new(MockMemory {
        used_percent: 40.0,
        swap: Some(SwapMemory {
            total: 1024,
            used: 512,
            used_percent: 50.0,
        }),
        fail_swap: true,
    });
    let mut collector = MemoryCollector::new(source, MemoryConfig::default(), alerts.clone());

    let metrics = collector.collect().await.expect("pass must succeed");

    let usage = find(&metrics, "memory_usage");
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].labels.get("type").unwrap(), "virtual");
    assert!(metrics
        .iter()
        .all(|m| m.labels.get("type").map(String::as_str) != Some("swap")));
}

#[tokio::test]
async fn cpu_pass_metrics_share_one_timestamp() {
    let alerts = AlertManager::default();
    let source = Arc::new(MockCpu::new(vec![10.0, 20.0], 0.5));
    let mut collector = CpuCollector::new(source, CpuConfig::default(), alerts);

    let metrics = collector.collect().await.unwrap();

    assert!(!metrics.is_empty());
    let first = metrics[0].timestamp;
    assert!(metrics.iter().all(|m| m.timestamp == first));
}

#[tokio::test]
async fn high_memory_usage_raises_warning() {
    let alerts = AlertManager::default();
    let source = Arc::new(MockMemory {
        used_percent: 95.5,
        swap: Some(SwapMemory {
            total: 1024,
            used: 512,
            used_percent: 50.0,
        }),
        fail_swap: false,
    });
    let mut collector = MemoryCollector::new(source, MemoryConfig::default(), alerts.clone());

    let metrics = collector.collect().await.unwrap();
    assert_eq!(find(&metrics, "memory_usage").len(), 2); // virtual + swap

    let queued = alerts.drain();
    assert_eq!(queued.len(), 1);
    assert!(queued[0].message.contains("95.50%"));
}

#[tokio::test]
async fn pseudo_filesystems_are_skipped_and_thresholds_tier_alerts() {
    let alerts = AlertManager::default();
    let source = Arc::new(MockDisk {
        partitions: vec![
            partition("sda1", "ext4", 85.0),
            partition("sdb1", "xfs", 95.0),
            partition("shm", "tmpfs", 99.0),
        ],
        counters: Arc::new(Mutex::new(HashMap::new())),
    });
    let mut collector = DiskCollector::new(source, DiskConfig::default(), alerts.clone());

    let metrics = collector.collect().await.unwrap();

    let usage = find(&metrics, "disk_usage");
    assert_eq!(usage.len(), 2);
    assert!(usage
        .iter()
        .all(|m| m.labels.get("fstype").unwrap() != "tmpfs"));

    let mut queued = alerts.drain();
    queued.sort_by_key(|a| a.level);
    assert_eq!(queued.len(), 2);
    assert_eq!(queued[0].level, AlertLevel::Warning);
    assert!(queued[0].message.contains("/mnt/sda1"));
    assert_eq!(queued[1].level, AlertLevel::Critical);
    assert!(queued[1].message.contains("/mnt/sdb1"));
}

#[tokio::test]
async fn first_disk_pass_emits_no_rates_and_second_pass_does() {
    let alerts = AlertManager::default();
    let counters = Arc::new(Mutex::new(HashMap::from([(
        "sda".to_string(),
        IoCounters {
            read_bytes: 1000,
            write_bytes: 500,
            read_ops: 0,
            write_ops: 0,
        },
    )])));
    let source = Arc::new(MockDisk {
        partitions: vec![partition("sda", "ext4", 10.0)],
        counters: counters.clone(),
    });
    let mut collector = DiskCollector::new(source, DiskConfig::default(), alerts);

    let first = collector.collect().await.unwrap();
    assert!(find(&first, "disk_read_rate").is_empty());
    assert_eq!(find(&first, "disk_read_bytes_total").len(), 1);

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    counters.lock().unwrap().get_mut("sda").unwrap().read_bytes = 3000;

    let second = collector.collect().await.unwrap();
    let read_rate = find(&second, "disk_read_rate");
    assert_eq!(read_rate.len(), 1);
    assert!(read_rate[0].value > 0.0);
    // No op counters on this platform, so no IOPS series either.
    assert!(find(&second, "disk_iops_read").is_empty());
}

#[test]
fn zero_elapsed_time_suppresses_all_rates() {
    let counters = HashMap::from([(
        "sda".to_string(),
        IoCounters {
            read_bytes: 2000,
            write_bytes: 1000,
            read_ops: 10,
            write_ops: 5,
        },
    )]);
    assert!(compute_io_rates(&counters, &counters, 0.0).is_empty());
}

#[test]
fn counter_reset_skips_device_for_one_pass() {
    let prev = HashMap::from([(
        "sda".to_string(),
        IoCounters {
            read_bytes: 5000,
            write_bytes: 5000,
            read_ops: 0,
            write_ops: 0,
        },
    )]);
    let cur = HashMap::from([(
        "sda".to_string(),
        IoCounters {
            read_bytes: 100, // went backwards: reset
            write_bytes: 6000,
            read_ops: 0,
            write_ops: 0,
        },
    )]);
    assert!(compute_io_rates(&prev, &cur, 1.0).is_empty());
}

#[test]
fn iops_rates_appear_when_op_counters_are_reported() {
    let prev = HashMap::from([(
        "sda".to_string(),
        IoCounters {
            read_bytes: 0,
            write_bytes: 0,
            read_ops: 100,
            write_ops: 50,
        },
    )]);
    let cur = HashMap::from([(
        "sda".to_string(),
        IoCounters {
            read_bytes: 4096,
            write_bytes: 2048,
            read_ops: 300,
            write_ops: 150,
        },
    )]);

    let rates = compute_io_rates(&prev, &cur, 2.0);
    assert_eq!(rates.len(), 1);
    let (_, series) = &rates[0];
    let as_map: HashMap<_, _> = series.iter().cloned().collect();
    assert_eq!(as_map["disk_read_rate"], 2048.0);
    assert_eq!(as_map["disk_iops_read"], 100.0);
    assert_eq!(as_map["disk_iops_write"], 50.0);
}
