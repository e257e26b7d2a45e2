use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

const WINDOW_MS: u64 = 60_000;

/// Per-client request cap over the current wall-clock minute.
#[derive(Clone)]
pub struct RateLimiter {
    quota: usize,
    windows: Arc<RwLock<HashMap<String, Vec<u64>>>>,
}

fn minute_start(now: u64) -> u64 {
    now - now % WINDOW_MS
}

impl RateLimiter {
    pub fn new(quota: usize) -> Self {
        RateLimiter {
            quota,
            windows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn quota(&self) -> usize {
        self.quota
    }

    /// Record a request from `client_id` at `now` (ms) if the client still
    /// has budget in the current minute. Rejected requests are not recorded.
    pub fn admit(&self, client_id: &str, now: u64) -> bool {
        let start = minute_start(now);
        let mut windows = self.windows.write().unwrap_or_else(PoisonError::into_inner);

        let window = windows.entry(client_id.to_string()).or_default();
        window.retain(|&seen| seen >= start);

        if window.len() >= self.quota {
            return false;
        }

        window.push(now);
        true
    }

    /// Whole seconds until the current minute rolls over, at least one.
    pub fn retry_after_secs(&self, now: u64) -> u64 {
        let remaining_ms = minute_start(now) + WINDOW_MS - now;
        remaining_ms.div_ceil(1000).max(1)
    }

    /// Remaining budget for a client in the current minute.
    pub fn remaining(&self, client_id: &str, now: u64) -> usize {
        let start = minute_start(now);
        let windows = self.windows.read().unwrap_or_else(PoisonError::into_inner);
        let used = windows
            .get(client_id)
            .map(|window| window.iter().filter(|&&seen| seen >= start).count())
            .unwrap_or(0);
        self.quota.saturating_sub(used)
    }

    /// Drop clients with no request in the current minute.
    pub fn prune_idle(&self, now: u64) -> usize {
        let start = minute_start(now);
        let mut windows = self.windows.write().unwrap_or_else(PoisonError::into_inner);

        let initial_count = windows.len();
        windows.retain(|_, window| window.iter().any(|&seen| seen >= start));

        initial_count - windows.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
