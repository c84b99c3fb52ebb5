//! Flattened metric batches are re-shaped into the wire snapshot here.
//!
//! Collectors emit independent metric samples; the server wants one
//! structured [`AgentSnapshot`] per push. Assembly is lossy on purpose:
//! the snapshot carries the headline numbers, the full batch stays in the
//! agent's local store.

use chrono::Utc;
use ferromon_common::{
    AgentSnapshot, CoreUsage, CpuSnapshot, DiskIoSnapshot, DiskSnapshot, LoadSnapshot,
    MemorySnapshot, Metric, ResourceSnapshot, SwapSnapshot, VirtualMemorySnapshot,
    METRIC_CPU_USAGE, METRIC_DISK_USAGE, METRIC_LOAD_1, METRIC_LOAD_15, METRIC_LOAD_5,
    METRIC_MEMORY_USAGE,
};

pub fn assemble(agent_id: &str, hostname: &str, metrics: &[Metric]) -> AgentSnapshot {
    AgentSnapshot {
        agent_id: agent_id.to_string(),
        hostname: hostname.to_string(),
        metrics: ResourceSnapshot {
            cpu: cpu_snapshot(metrics),
            memory: memory_snapshot(metrics),
            disk: disk_snapshot(metrics),
        },
        timestamp: Utc::now(),
    }
}

fn label<'a>(m: &'a Metric, key: &str) -> Option<&'a str> {
    m.labels.get(key).map(String::as_str)
}

fn cpu_snapshot(metrics: &[Metric]) -> CpuSnapshot {
    let mut cores: Vec<CoreUsage> = metrics
        .iter()
        .filter(|m| m.name == METRIC_CPU_USAGE && label(m, "type") == Some("core"))
        .filter_map(|m| {
            let core = label(m, "core")?.parse().ok()?;
            Some(CoreUsage {
                core,
                usage: m.value,
            })
        })
        .collect();
    cores.sort_by_key(|c| c.core);

    let value_of = |name: &str| {
        metrics
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.value)
            .unwrap_or(0.0)
    };

    CpuSnapshot {
        logical_cores: cores.len() as u32,
        load: LoadSnapshot {
            one_min: value_of(METRIC_LOAD_1),
            five_min: value_of(METRIC_LOAD_5),
            fifteen_min: value_of(METRIC_LOAD_15),
        },
        cores,
    }
}

fn memory_snapshot(metrics: &[Metric]) -> MemorySnapshot {
    let value_of = |name: &str, kind: &str| {
        metrics
            .iter()
            .find(|m| m.name == name && label(m, "type") == Some(kind))
            .map(|m| m.value)
    };

    let virtual_memory = VirtualMemorySnapshot {
        usage: value_of(METRIC_MEMORY_USAGE, "virtual").unwrap_or(0.0),
        total: value_of("memory_total", "virtual").unwrap_or(0.0) as u64,
        used: value_of("memory_used", "virtual").unwrap_or(0.0) as u64,
        free: value_of("memory_free", "virtual").unwrap_or(0.0) as u64,
        available: value_of("memory_available", "virtual").unwrap_or(0.0) as u64,
    };

    // Swap only appears in the snapshot when the collector saw counters.
    let swap = value_of(METRIC_MEMORY_USAGE, "swap").map(|usage| SwapSnapshot {
        usage,
        total: value_of("memory_total", "swap").unwrap_or(0.0) as u64,
        used: value_of("memory_used", "swap").unwrap_or(0.0) as u64,
    });

    MemorySnapshot {
        virtual_memory,
        swap,
    }
}

fn disk_snapshot(metrics: &[Metric]) -> DiskSnapshot {
    // Headline partition: the root filesystem when present, otherwise the
    // fullest one.
    let headline = metrics
        .iter()
        .filter(|m| m.name == METRIC_DISK_USAGE)
        .max_by(|a, b| {
            let a_root = label(a, "mountpoint") == Some("/");
            let b_root = label(b, "mountpoint") == Some("/");
            a_root
                .cmp(&b_root)
                .then(a.value.partial_cmp(&b.value).unwrap_or(std::cmp::Ordering::Equal))
        });

    let (usage, total, free) = match headline {
        Some(m) => {
            let mountpoint = label(m, "mountpoint");
            let sibling = |name: &str| {
                metrics
                    .iter()
                    .find(|s| s.name == name && label(s, "mountpoint") == mountpoint)
                    .map(|s| s.value as u64)
                    .unwrap_or(0)
            };
            (m.value, sibling("disk_total"), sibling("disk_free"))
        }
        None => (0.0, 0, 0),
    };

    let sum_of = |name: &str| {
        metrics
            .iter()
            .filter(|m| m.name == name)
            .map(|m| m.value as u64)
            .sum()
    };

    DiskSnapshot {
        usage,
        total,
        free,
        io: DiskIoSnapshot {
            read_bytes: sum_of("disk_read_bytes_total"),
            write_bytes: sum_of("disk_write_bytes_total"),
        },
    }
}
