//! In-memory time-windowed metric store.
//!
//! [`MetricStore`] is an append-only buffer with a sliding retention
//! window. Retention is enforced on every insert and re-checked at query
//! time, and the owning process is expected to run a periodic [`purge`]
//! sweep so stale entries cannot outlive the window when inserts stop.
//!
//! [`purge`]: MetricStore::purge


use chrono::{DateTime, Duration, Utc};
use ferromon_common::Metric;
use std::collections::HashMap;
use std::sync::RwLock;

/// Concurrency-safe metric buffer with a sliding retention window.
///
/// Readers take a shared lock, writers an exclusive one; the write lock is
/// held only for the duration of a single mutation, never across calls.
pub struct MetricStore {
    metrics: RwLock<Vec<Metric>>,
    retention: Duration,
}

impl MetricStore {
    /// Creates a store that retains entries with
    /// `timestamp > now - retention`.
    pub fn new(retention: Duration) -> Self {
        Self {
            metrics: RwLock::new(Vec::new()),
            retention,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Appends a batch, then drops every entry that has fallen out of the
    /// retention window as of now.
    pub fn insert(&self, batch: Vec<Metric>) {
        let cutoff = Utc::now() - self.retention;
        let mut metrics = self
            .metrics
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        metrics.extend(batch);
        metrics.retain(|m| m.timestamp > cutoff);
    }

    /// Returns entries matching `name`, the label subset, and the last
    /// `window` of time (inclusive range ending now).
    pub fn query(&self, name: &str, labels: &HashMap<String, String>, window: Duration) -> Vec<Metric> {
        let now = Utc::now();
        self.query_range(name, labels, now - window, now)
    }

    /// Returns entries matching `name`, the label subset, and the inclusive
    /// time range `[start, end]`.
    ///
    /// Every label key in `labels` must be present with an equal value on
    /// the entry; keys absent from the query are wildcards. Results are
    /// additionally clamped to the retention cutoff so a query never
    /// reveals entries the retention promise says are gone, even when
    /// inserts have stopped.
    pub fn query_range(
        &self,
        name: &str,
        labels: &HashMap<String, String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<Metric> {
        let cutoff = Utc::now() - self.retention;
        let metrics = self
            .metrics
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        metrics
            .iter()
            .filter(|m| {
                m.name == name
                    && m.timestamp >= start
                    && m.timestamp <= end
                    && m.timestamp > cutoff
                    && labels_match(&m.labels, labels)
            })
            .cloned()
            .collect()
    }

    /// Removes entries older than `age`. Returns the number removed.
    pub fn purge(&self, age: Duration) -> usize {
        let cutoff = Utc::now() - age;
        let mut metrics = self
            .metrics
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = metrics.len();
        metrics.retain(|m| m.timestamp > cutoff);
        let removed = before - metrics.len();
        if removed > 0 {
            tracing::debug!(removed, "Purged expired metrics");
        }
        removed
    }

    /// Removes entries outside the configured retention window.
    pub fn purge_expired(&self) -> usize {
        self.purge(self.retention)
    }

    pub fn len(&self) -> usize {
        self.metrics
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies out the whole buffer. Intended for handlers and tests, not
    /// hot paths.
    pub fn snapshot(&self) -> Vec<Metric> {
        self.metrics
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

fn labels_match(entry: &HashMap<String, String>, wanted: &HashMap<String, String>) -> bool {
    wanted
        .iter()
        .all(|(k, v)| entry.get(k).is_some_and(|have| have == v))
}
