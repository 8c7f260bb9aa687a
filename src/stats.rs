//! Per-client request counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Counters for one client instance.
///
/// Created with the client and never reset. `requests >= calls` always holds,
/// since every logical call issues at least one request.
#[derive(Debug, Default)]
pub struct Stats {
    calls: AtomicU64,
    requests: AtomicU64,
    rate_limit_errors: Mutex<Vec<u64>>,
}

/// A point-in-time copy of [`Stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Logical calls started.
    pub calls: u64,
    /// HTTP requests issued, including retries.
    pub requests: u64,
    /// Rate-limit responses seen, indexed by `attempt - 1`.
    pub rate_limit_errors: Vec<u64>,
}

impl Stats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a rate-limit response received on the 1-based `attempt`.
    pub(crate) fn record_rate_limit(&self, attempt: usize) {
        let index = attempt.saturating_sub(1);
        let mut errors = self
            .rate_limit_errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if errors.len() <= index {
            errors.resize(index + 1, 0);
        }
        errors[index] += 1;
    }

    /// Logical calls started so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// HTTP requests issued so far.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Copies the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        let rate_limit_errors = self
            .rate_limit_errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        StatsSnapshot {
            calls: self.calls(),
            requests: self.requests(),
            rate_limit_errors,
        }
    }
}
