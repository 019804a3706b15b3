//! Health tracking for tool servers
//!
//! Quarantines repeatedly failing handles behind a fixed wall-clock
//! cooldown. One failure means one cooldown; there is no exponential
//! backoff, since the catalog is small and operator inspection beats
//! aggressive avoidance. Health filtering applies only to new discovery
//! results, never to cached entries.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Per-handle failure record
#[derive(Debug, Clone)]
pub struct HealthRecord {
    /// Consecutive failures since the last success
    pub consecutive_failures: u32,
    /// When the handle last failed
    pub last_failure: Instant,
    /// The handle is quarantined until this instant
    pub cooldown_until: Instant,
}

/// Read-only health view for observability taps
#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub handle: String,
    pub consecutive_failures: u32,
    /// Remaining cooldown; zero when the cooldown has elapsed
    pub cooldown_remaining: Duration,
}

/// Tracks per-handle failures with a fixed cooldown
pub struct HealthTracker {
    cooldown: Duration,
    records: Mutex<HashMap<String, HealthRecord>>,
}

impl HealthTracker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// A handle is healthy iff it has no record or its cooldown elapsed
    pub fn is_healthy(&self, handle: &str) -> bool {
        let records = self.records.lock().unwrap();
        match records.get(handle) {
            Some(record) => Instant::now() >= record.cooldown_until,
            None => true,
        }
    }

    /// Clear the record for a handle after a successful use
    pub fn mark_ok(&self, handle: &str) {
        let mut records = self.records.lock().unwrap();
        if records.remove(handle).is_some() {
            debug!("Cleared health record for '{}'", handle);
        }
    }

    /// Record a failure and start the cooldown
    pub fn mark_fail(&self, handle: &str) {
        let now = Instant::now();
        let mut records = self.records.lock().unwrap();
        let record = records
            .entry(handle.to_string())
            .and_modify(|r| {
                r.consecutive_failures += 1;
                r.last_failure = now;
                r.cooldown_until = now + self.cooldown;
            })
            .or_insert(HealthRecord {
                consecutive_failures: 1,
                last_failure: now,
                cooldown_until: now + self.cooldown,
            });
        warn!(
            "Marked '{}' unhealthy ({} consecutive failure(s), cooldown {}s)",
            handle,
            record.consecutive_failures,
            self.cooldown.as_secs()
        );
    }

    /// Healthy subset of `handles`, preserving order
    pub fn filter_healthy(&self, handles: &[String]) -> Vec<String> {
        handles
            .iter()
            .filter(|h| self.is_healthy(h))
            .cloned()
            .collect()
    }

    /// Snapshot of every tracked handle for observability
    pub fn snapshot(&self) -> Vec<HealthSnapshot> {
        let now = Instant::now();
        let records = self.records.lock().unwrap();
        records
            .iter()
            .map(|(handle, record)| HealthSnapshot {
                handle: handle.clone(),
                consecutive_failures: record.consecutive_failures,
                cooldown_remaining: record.cooldown_until.saturating_duration_since(now),
            })
            .collect()
    }
}
