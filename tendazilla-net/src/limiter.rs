//! Per-host rate limiter
//!
//! Process-wide throttling state, created at pipeline start and shared behind
//! an `Arc`. Each host has a next-slot timestamp; a caller reserves the next
//! slot atomically under that host's map entry, then sleeps until it. Two
//! concurrent callers for one host therefore get slots `min_interval` apart
//! instead of firing together.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::ScrapeConfig;

/// Proof that a request to `host` may go out now
#[derive(Debug, Clone)]
pub struct Permit {
    pub host: String,
    pub granted_at: Instant,
    /// How long the caller was held back
    pub waited: Duration,
}

/// Per-host request spacing
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    jitter: Duration,
    last_permit: DashMap<String, Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            jitter: Duration::ZERO,
            last_permit: DashMap::new(),
        }
    }

    pub fn from_config(config: &ScrapeConfig) -> Self {
        Self::new(config.min_interval()).with_jitter(config.jitter())
    }

    /// Add up to `jitter` of random extra spacing whenever a caller is held back
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until `host` may be contacted again, then record the permit
    pub async fn acquire(&self, host: &str) -> Permit {
        let requested_at = Instant::now();
        let slot = self.reserve(host, requested_at);

        if slot > requested_at {
            debug!("Throttling {} for {:?}", host, slot - requested_at);
            tokio::time::sleep_until(slot).await;
        }

        Permit {
            host: host.to_string(),
            granted_at: slot,
            waited: slot.saturating_duration_since(requested_at),
        }
    }

    fn reserve(&self, host: &str, now: Instant) -> Instant {
        let key = host.to_ascii_lowercase();
        match self.last_permit.entry(key) {
            Entry::Occupied(mut entry) => {
                let earliest = *entry.get() + self.min_interval;
                let slot = if earliest > now {
                    earliest + self.sample_jitter()
                } else {
                    now
                };
                entry.insert(slot);
                slot
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                now
            }
        }
    }

    fn sample_jitter(&self) -> Duration {
        if self.jitter.is_zero() {
            return Duration::ZERO;
        }
        use rand::Rng;
        let max_ms = self.jitter.as_millis().min(u64::MAX as u128) as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }

    /// Time of the most recent permit for `host`
    pub fn last_permit(&self, host: &str) -> Option<Instant> {
        self.last_permit
            .get(&host.to_ascii_lowercase())
            .map(|entry| *entry.value())
    }

    pub fn tracked_hosts(&self) -> usize {
        self.last_permit.len()
    }

    /// Forget all per-host history
    pub fn reset(&self) {
        self.last_permit.clear();
    }
}
