use chrono::{DateTime, Duration, Utc};
use ferromon_common::{
    AgentSnapshot, Metric, METRIC_CPU_USAGE, METRIC_DISK_USAGE, METRIC_LOAD_1, METRIC_LOAD_15,
    METRIC_LOAD_5, METRIC_MEMORY_USAGE,
};
use ferromon_store::MetricStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Latest snapshot per agent, keyed by agent id.
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<String, AgentSnapshot>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the snapshot, replacing any prior one for the same agent.
    pub fn upsert(&mut self, snapshot: AgentSnapshot) {
        if !self.agents.contains_key(&snapshot.agent_id) {
            tracing::info!(
                agent_id = %snapshot.agent_id,
                hostname = %snapshot.hostname,
                "New agent registered"
            );
        }
        self.agents.insert(snapshot.agent_id.clone(), snapshot);
    }

    pub fn get(&self, agent_id: &str) -> Option<&AgentSnapshot> {
        self.agents.get(agent_id)
    }

    pub fn snapshots(&self) -> HashMap<String, AgentSnapshot> {
        self.agents.clone()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Drops agents whose last push is older than `threshold`. Returns the
    /// number removed.
    pub fn reap(&mut self, threshold: Duration) -> usize {
        let cutoff = Utc::now() - threshold;
        let before = self.agents.len();
        self.agents.retain(|agent_id, snapshot| {
            let alive = snapshot.timestamp > cutoff;
            if !alive {
                tracing::warn!(
                    agent_id = %agent_id,
                    last_seen = %snapshot.timestamp,
                    "Removing stale agent"
                );
            }
            alive
        });
        before - self.agents.len()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Mutex<AgentRegistry>>,
    pub store: Arc<MetricStore>,
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(retention: Duration) -> Self {
        Self {
            registry: Arc::new(Mutex::new(AgentRegistry::new())),
            store: Arc::new(MetricStore::new(retention)),
            start_time: Utc::now(),
        }
    }

    pub fn lock_registry(&self) -> std::sync::MutexGuard<'_, AgentRegistry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Explodes a structured snapshot back into flat metrics for the server's
/// queryable store, labelled with the originating agent.
pub fn flatten_snapshot(snapshot: &AgentSnapshot) -> Vec<Metric> {
    let ts = snapshot.timestamp;
    let tag = |m: Metric| m.with_label("agent", snapshot.agent_id.clone());
    let mut metrics = Vec::new();

    for core in &snapshot.metrics.cpu.cores {
        metrics.push(tag(Metric::new(METRIC_CPU_USAGE, core.usage, ts)
            .with_label("type", "core")
            .with_label("core", core.core.to_string())));
    }
    metrics.push(tag(Metric::new(
        METRIC_LOAD_1,
        snapshot.metrics.cpu.load.one_min,
        ts,
    )));
    metrics.push(tag(Metric::new(
        METRIC_LOAD_5,
        snapshot.metrics.cpu.load.five_min,
        ts,
    )));
    metrics.push(tag(Metric::new(
        METRIC_LOAD_15,
        snapshot.metrics.cpu.load.fifteen_min,
        ts,
    )));

    metrics.push(tag(Metric::new(
        METRIC_MEMORY_USAGE,
        snapshot.metrics.memory.virtual_memory.usage,
        ts,
    )
    .with_label("type", "virtual")));
    if let Some(swap) = &snapshot.metrics.memory.swap {
        metrics.push(tag(
            Metric::new(METRIC_MEMORY_USAGE, swap.usage, ts).with_label("type", "swap")
        ));
    }

    metrics.push(tag(Metric::new(
        METRIC_DISK_USAGE,
        snapshot.metrics.disk.usage,
        ts,
    )));

    metrics
}
