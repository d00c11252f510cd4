//! Storage backends for circuit breaker failure accounting
//!
//! A backend keeps the consecutive qualifying-failure streak for each circuit
//! (keyed by circuit name) and supplies the monotonic time used to measure
//! break durations. Several breakers may share one backend as long as their
//! names differ.

use crate::clock::{Clock, MonotonicClock};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Abstract storage backend for circuit breaker failure streaks
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Record a successful operation, ending any failure streak
    fn record_success(&self, circuit_name: &str);

    /// Record a qualifying failure and return the new streak length
    fn record_failure(&self, circuit_name: &str) -> usize;

    /// Current streak of consecutive qualifying failures
    fn consecutive_failures(&self, circuit_name: &str) -> usize;

    /// Forget the streak for a circuit
    fn clear(&self, circuit_name: &str);

    /// Forget the streaks of all circuits
    fn clear_all(&self);

    /// Get monotonic time (relative to the backend's clock anchor)
    fn monotonic_time(&self) -> Duration;
}

/// Thread-safe in-memory storage
#[derive(Debug)]
pub struct MemoryStorage {
    /// Failure streaks keyed by circuit name
    streaks: RwLock<HashMap<String, usize>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStorage {
    /// Create a new storage instance on the system monotonic clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock::new()))
    }

    /// Create storage that reads time from `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            streaks: RwLock::new(HashMap::new()),
            clock,
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryStorage {
    fn record_success(&self, circuit_name: &str) {
        let mut streaks = self.streaks.write();
        if let Some(count) = streaks.get_mut(circuit_name) {
            *count = 0;
        }
    }

    fn record_failure(&self, circuit_name: &str) -> usize {
        let mut streaks = self.streaks.write();
        let count = streaks.entry(circuit_name.to_string()).or_default();
        *count = count.saturating_add(1);
        *count
    }

    fn consecutive_failures(&self, circuit_name: &str) -> usize {
        self.streaks.read().get(circuit_name).copied().unwrap_or(0)
    }

    fn clear(&self, circuit_name: &str) {
        self.streaks.write().remove(circuit_name);
    }

    fn clear_all(&self) {
        self.streaks.write().clear();
    }

    fn monotonic_time(&self) -> Duration {
        self.clock.now()
    }
}
