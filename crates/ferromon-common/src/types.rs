use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// Metric names shared between collectors and snapshot assembly.
pub const METRIC_CPU_USAGE: &str = "cpu_usage";
pub const METRIC_CPU_FREQUENCY: &str = "cpu_frequency";
pub const METRIC_LOAD_1: &str = "system_load1";
pub const METRIC_LOAD_5: &str = "system_load5";
pub const METRIC_LOAD_15: &str = "system_load15";
pub const METRIC_LOAD_PER_CPU: &str = "system_load_per_cpu";
pub const METRIC_MEMORY_USAGE: &str = "memory_usage";
pub const METRIC_DISK_USAGE: &str = "disk_usage";

/// A single normalized metric sample.
///
/// Metrics are immutable once created and carry their dimension keys in
/// `labels` (e.g. `core`, `type`, `device`). Duplicates with identical
/// name, labels and timestamp are allowed; the store has append-only log
/// semantics and never deduplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub labels: HashMap<String, String>,
}

impl Metric {
    pub fn new(name: &str, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            value,
            timestamp,
            labels: HashMap::new(),
        }
    }

    pub fn with_label(mut self, key: &str, value: impl Into<String>) -> Self {
        self.labels.insert(key.to_string(), value.into());
        self
    }
}

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use ferromon_common::AlertLevel;
///
/// let level: AlertLevel = "warning".parse().unwrap();
/// assert_eq!(level, AlertLevel::Warning);
/// assert_eq!(level.to_string(), "warning");
/// assert!(AlertLevel::Critical > AlertLevel::Info);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertLevel::Info => write!(f, "info"),
            AlertLevel::Warning => write!(f, "warning"),
            AlertLevel::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for AlertLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(AlertLevel::Info),
            "warning" => Ok(AlertLevel::Warning),
            "critical" => Ok(AlertLevel::Critical),
            _ => Err(format!("unknown alert level: {s}")),
        }
    }
}

/// A threshold breach or collection problem raised during a collection pass.
///
/// Alerts are queued by collectors and drained in full by the consumer;
/// a drained alert is gone (at-most-once delivery per drain).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub source: String,
    pub level: AlertLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// One agent's complete metrics payload as of one timestamp.
///
/// The server keeps at most one snapshot per `agent_id`; a newer push
/// replaces the prior one in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent_id: String,
    pub hostname: String,
    pub metrics: ResourceSnapshot,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub cpu: CpuSnapshot,
    pub memory: MemorySnapshot,
    pub disk: DiskSnapshot,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub cores: Vec<CoreUsage>,
    pub load: LoadSnapshot,
    pub logical_cores: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreUsage {
    pub core: u32,
    pub usage: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadSnapshot {
    #[serde(rename = "1m")]
    pub one_min: f64,
    #[serde(rename = "5m")]
    pub five_min: f64,
    #[serde(rename = "15m")]
    pub fifteen_min: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySnapshot {
    #[serde(rename = "virtual")]
    pub virtual_memory: VirtualMemorySnapshot,
    /// Absent when the host reports no swap counters.
    pub swap: Option<SwapSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VirtualMemorySnapshot {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub usage: f64,
    pub available: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwapSnapshot {
    pub total: u64,
    pub used: u64,
    pub usage: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskSnapshot {
    pub usage: f64,
    pub total: u64,
    pub free: u64,
    pub io: DiskIoSnapshot,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskIoSnapshot {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// Format a labels map into a stable human-readable string.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use ferromon_common::types::format_labels;
///
/// let mut labels = HashMap::new();
/// labels.insert("core".to_string(), "0".to_string());
/// labels.insert("type".to_string(), "core".to_string());
/// assert_eq!(format_labels(&labels), "core=0, type=core");
/// ```
pub fn format_labels(labels: &HashMap<String, String>) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let mut pairs: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
    pairs.sort();
    pairs.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_level_round_trips_through_serde() {
        let json = serde_json::to_string(&AlertLevel::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
        let level: AlertLevel = serde_json::from_str("\"critical\"").unwrap();
        assert_eq!(level, AlertLevel::Critical);
    }

    #[test]
    fn snapshot_wire_format_uses_short_load_keys() {
        let snapshot = AgentSnapshot {
            agent_id: "a-1".into(),
            hostname: "web-01".into(),
            metrics: ResourceSnapshot::default(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["metrics"]["cpu"]["load"].get("1m").is_some());
        assert!(json["metrics"]["cpu"]["load"].get("one_min").is_none());
        assert!(json["metrics"]["memory"].get("virtual").is_some());
        assert!(json["metrics"]["memory"].get("virtual_memory").is_none());
    }

    #[test]
    fn metric_builder_sets_labels() {
        let m = Metric::new(METRIC_CPU_USAGE, 42.0, Utc::now())
            .with_label("type", "core")
            .with_label("core", "3");
        assert_eq!(m.labels.get("core").unwrap(), "3");
        assert_eq!(format_labels(&m.labels), "core=3, type=core");
    }
}
