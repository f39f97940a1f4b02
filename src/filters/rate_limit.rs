//! Per-client token bucket rate limiting.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use dashmap::DashMap;

use crate::config::RateLimitFilterConfig;
use crate::filters::{Filter, FilterContext, FilterError, FilterResult, Rejection};
use crate::observability::metrics;

/// Idle buckets are swept once every this many checks.
const SWEEP_EVERY: u64 = 1024;

/// A simple token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Rejects with 429 once a client exhausts its bucket.
///
/// Runs per candidate, so a fan-out of N targets spends N tokens.
/// A bucket untouched for long enough to refill completely is
/// indistinguishable from a fresh one and gets evicted.
#[derive(Debug)]
pub struct RateLimitFilter {
    buckets: DashMap<IpAddr, TokenBucket>,
    rps: f64,
    burst: f64,
    idle_after: Duration,
    checks: AtomicU64,
}

impl RateLimitFilter {
    pub const NAME: &'static str = "rate-limit";

    pub fn from_config(config: &RateLimitFilterConfig) -> Result<Self, FilterError> {
        if config.requests_per_second == 0 {
            return Err(FilterError::InvalidSettings {
                filter: Self::NAME,
                reason: "requests_per_second must be > 0".into(),
            });
        }
        let burst = config.burst.max(1) as f64;
        let rps = config.requests_per_second as f64;
        Ok(Self {
            buckets: DashMap::new(),
            rps,
            burst,
            idle_after: Duration::from_secs_f64(burst / rps),
            checks: AtomicU64::new(0),
        })
    }

    fn check(&self, key: IpAddr) -> bool {
        // Sweep before taking the entry; retain must not run while a shard is held.
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.evict_idle();
        }

        self.buckets
            .entry(key)
            .or_insert_with(|| TokenBucket::new(self.burst))
            .try_acquire(self.burst, self.rps)
    }

    /// Drop buckets that have refilled to capacity while unused.
    fn evict_idle(&self) {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| bucket.last_update.elapsed() < self.idle_after);
        let evicted = before.saturating_sub(self.buckets.len());
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.buckets.len(), "Evicted idle rate-limit buckets");
        }
    }
}

impl Filter for RateLimitFilter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn pre(&self, ctx: &mut FilterContext<'_>) -> FilterResult {
        let key = ctx
            .inbound()
            .client_addr()
            .map(|addr| addr.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        if self.check(key) {
            Ok(())
        } else {
            tracing::warn!(client = %key, "Rate limit exceeded");
            metrics::record_rate_limited();
            Err(Rejection::new(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded"))
        }
    }
}
