use chrono::Utc;
use ferromon_common::{Alert, AlertLevel};
use std::sync::{Arc, Mutex};

/// Shared alert queue.
///
/// Cloning the manager produces another handle to the same queue, so every
/// collector can push into it concurrently while one consumer drains.
/// The queue is unbounded; collectors raise at most a handful of alerts
/// per pass and the agent drains every tick.
#[derive(Clone, Default)]
pub struct AlertManager {
    queue: Arc<Mutex<Vec<Alert>>>,
}

impl AlertManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one alert to the queue.
    pub fn add(&self, alert: Alert) {
        let mut queue = self
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        queue.push(alert);
    }

    /// Convenience constructor for the common warning case.
    pub fn warn(&self, source: &str, message: String) {
        self.add(Alert {
            source: source.to_string(),
            level: AlertLevel::Warning,
            message,
            timestamp: Utc::now(),
        });
    }

    /// Returns the current queue and atomically empties it.
    ///
    /// Every alert added before the drain appears in exactly one drain
    /// result; there is no partial-drain API.
    pub fn drain(&self) -> Vec<Alert> {
        let mut queue = self
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *queue)
    }

    pub fn len(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
