use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

/// Application metrics capability
pub trait Metrics: Send + Sync {
    /// Add `by` to a monotonically increasing counter
    fn increment(&self, name: &str, by: u64);

    /// Set a gauge to its current value
    fn gauge(&self, name: &str, value: f64);

    /// Record one observation of a distribution
    fn observe(&self, name: &str, value: f64);

    /// Record a duration in milliseconds
    fn timing(&self, name: &str, elapsed: Duration) {
        self.observe(name, elapsed.as_micros() as f64 / 1000.0);
    }

    fn snapshot(&self) -> MetricsSnapshot;
}

/// Summary of a recorded distribution
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Distribution {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl Distribution {
    fn record(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Point-in-time copy of every metric
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, f64>,
    pub distributions: BTreeMap<String, Distribution>,
}

impl MetricsSnapshot {
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }
}

/// Metrics kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    state: Mutex<MetricsSnapshot>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        *self.state.lock() = MetricsSnapshot::default();
    }
}

impl Metrics for InMemoryMetrics {
    fn increment(&self, name: &str, by: u64) {
        let mut state = self.state.lock();
        let counter = state.counters.entry(name.to_string()).or_insert(0);
        *counter = counter.saturating_add(by);
    }

    fn gauge(&self, name: &str, value: f64) {
        self.state.lock().gauges.insert(name.to_string(), value);
    }

    fn observe(&self, name: &str, value: f64) {
        self.state
            .lock()
            .distributions
            .entry(name.to_string())
            .or_default()
            .record(value);
    }

    fn snapshot(&self) -> MetricsSnapshot {
        self.state.lock().clone()
    }
}
