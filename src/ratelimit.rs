//! Per-identity request quota.
//!
//! A sliding-window limiter evaluated strictly before any template, cache,
//! budget or tier logic. A rejected request never touches the ledger and is
//! reported distinctly from budget exhaustion.

use crate::clock::Clock;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Buckets above this count trigger a prune of empty buckets on the next
/// check, keeping the map bounded under identity churn.
const PRUNE_THRESHOLD: usize = 10_000;

/// In-memory sliding-window rate limiter keyed by identity.
pub struct IdentityRateLimiter {
    clock: Arc<dyn Clock>,
    limit: u32,
    window: ChronoDuration,
    buckets: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
}

impl IdentityRateLimiter {
    pub fn new(clock: Arc<dyn Clock>, limit: u32, window: Duration) -> Self {
        Self {
            clock,
            limit: limit.max(1),
            window: ChronoDuration::from_std(window).unwrap_or(ChronoDuration::seconds(60)),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Record one request attempt for `key`; `false` means over quota.
    pub fn allow(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut buckets = self.buckets.lock().unwrap();
        if buckets.len() > PRUNE_THRESHOLD {
            let horizon = now - self.window;
            buckets.retain(|_, b| b.back().map(|t| *t > horizon).unwrap_or(false));
        }
        let bucket = buckets.entry(key.to_string()).or_default();
        while bucket
            .front()
            .map(|t| now - *t > self.window)
            .unwrap_or(false)
        {
            bucket.pop_front();
        }
        if bucket.len() >= self.limit as usize {
            return false;
        }
        bucket.push_back(now);
        true
    }

    /// Requests currently counted against `key`.
    pub fn used(&self, key: &str) -> usize {
        let now = self.clock.now();
        let buckets = self.buckets.lock().unwrap();
        buckets
            .get(key)
            .map(|b| b.iter().filter(|t| now - **t <= self.window).count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(limit: u32, window_secs: u64) -> (IdentityRateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::fixed());
        (
            IdentityRateLimiter::new(clock.clone(), limit, Duration::from_secs(window_secs)),
            clock,
        )
    }

    #[test]
    fn quota_enforced_within_window() {
        let (limiter, _clock) = limiter(3, 60);
        assert!(limiter.allow("u1"));
        assert!(limiter.allow("u1"));
        assert!(limiter.allow("u1"));
        assert!(!limiter.allow("u1"));
        // Independent identities have independent quotas.
        assert!(limiter.allow("u2"));
    }

    #[test]
    fn window_slides_with_the_clock() {
        let (limiter, clock) = limiter(2, 60);
        assert!(limiter.allow("u1"));
        assert!(limiter.allow("u1"));
        assert!(!limiter.allow("u1"));
        clock.advance(ChronoDuration::seconds(61));
        assert!(limiter.allow("u1"));
        assert_eq!(limiter.used("u1"), 1);
    }
}
