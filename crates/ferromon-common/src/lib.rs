//! Shared data model for the ferromon monitoring system.
//!
//! Both the agent and the server depend on this crate for the metric,
//! alert and snapshot types that cross the wire.

pub mod types;

pub use types::{
    format_labels, Alert, AlertLevel, AgentSnapshot, CoreUsage, CpuSnapshot, DiskIoSnapshot,
    DiskSnapshot, LoadSnapshot, MemorySnapshot, Metric, ResourceSnapshot, SwapSnapshot,
    VirtualMemorySnapshot, METRIC_CPU_FREQUENCY, METRIC_CPU_USAGE, METRIC_DISK_USAGE,
    METRIC_LOAD_1, METRIC_LOAD_15, METRIC_LOAD_5, METRIC_LOAD_PER_CPU, METRIC_MEMORY_USAGE,
};
