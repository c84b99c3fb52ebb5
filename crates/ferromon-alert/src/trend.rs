use serde::Serialize;
use std::collections::VecDeque;

/// Qualitative direction of a scalar series over its retained window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadTrend {
    Insufficient,
    Stable,
    Increasing,
    IncreasingRapidly,
    Decreasing,
    DecreasingRapidly,
}

impl std::fmt::Display for LoadTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LoadTrend::Insufficient => "insufficient",
            LoadTrend::Stable => "stable",
            LoadTrend::Increasing => "increasing",
            LoadTrend::IncreasingRapidly => "increasing_rapidly",
            LoadTrend::Decreasing => "decreasing",
            LoadTrend::DecreasingRapidly => "decreasing_rapidly",
        };
        write!(f, "{s}")
    }
}

/// Classifies a history window by comparing its oldest and newest samples.
///
/// This is a deliberate two-point comparison over the whole window, not a
/// moving average or regression; the 0.1 / 0.5 breakpoints are part of the
/// behavioral contract.
pub fn classify(history: &[f64]) -> LoadTrend {
    if history.len() < 2 {
        return LoadTrend::Insufficient;
    }

    let oldest = history[0];
    let newest = history[history.len() - 1];
    let delta = newest - oldest;

    if delta > 0.5 {
        LoadTrend::IncreasingRapidly
    } else if delta > 0.1 {
        LoadTrend::Increasing
    } else if delta < -0.5 {
        LoadTrend::DecreasingRapidly
    } else if delta < -0.1 {
        LoadTrend::Decreasing
    } else {
        LoadTrend::Stable
    }
}

/// Fixed-capacity FIFO of scalar samples, oldest evicted first.
///
/// Used only for trend classification; the capacity is a configuration
/// constant, never adaptive.
#[derive(Debug)]
pub struct RollingHistory {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RollingHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Appends one sample, evicting the oldest if the window is full.
    pub fn push(&mut self, sample: f64) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Classifies the current window.
    ///
    /// `classify` only looks at the endpoints, so passing them alone is
    /// equivalent to handing over the whole window.
    pub fn trend(&self) -> LoadTrend {
        if self.samples.len() < 2 {
            return LoadTrend::Insufficient;
        }
        match (self.samples.front(), self.samples.back()) {
            (Some(&oldest), Some(&newest)) => classify(&[oldest, newest]),
            _ => LoadTrend::Insufficient,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
