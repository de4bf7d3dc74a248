use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::time::Duration;

/// When the quota-introspection endpoint itself fails, assume the full
/// quota comes back after this long.
pub const FALLBACK_RESET: Duration = Duration::from_secs(15 * 60);

/// Quota state for the pull-based search endpoint. Owned exclusively by
/// the search collector; mutated after every call attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitWindow {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitWindow {
    pub fn new(limit: u32, remaining: u32, reset_at: DateTime<Utc>) -> Self {
        Self {
            limit,
            remaining,
            reset_at,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// True once the window boundary has been crossed and the quota state
    /// should be re-fetched.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now > self.reset_at
    }

    pub fn secs_to_reset(&self, now: DateTime<Utc>) -> u64 {
        (self.reset_at - now).num_seconds().max(0) as u64
    }

    /// Each call consumes one unit of budget regardless of result count.
    pub fn record_call(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }

    /// Degraded refresh when introspection fails: push the boundary out by
    /// the fallback delay and assume the full quota is back.
    pub fn assume_reset(&mut self) {
        self.reset_at = self.reset_at
            + ChronoDuration::from_std(FALLBACK_RESET).expect("fallback fits in chrono range");
        self.remaining = self.limit;
    }

    /// How long to stall when the budget is exhausted: until the window
    /// resets, plus the caller's gap as a small buffer.
    pub fn stall_sleep(&self, timegap: Duration, now: DateTime<Utc>) -> Duration {
        timegap + Duration::from_secs(self.secs_to_reset(now))
    }

    /// Inter-pass sleep spreading the remaining budget evenly over the
    /// time left in the window instead of bursting.
    pub fn spread_sleep(&self, timegap: Duration, now: DateTime<Utc>) -> Duration {
        let to_reset = self.secs_to_reset(now) as i64;
        let spread = to_reset - 2 * self.remaining as i64;
        Duration::from_secs(spread.max(0) as u64).max(timegap)
    }
}

/// Wire shape of the quota-introspection endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    /// Unix timestamp at which the budget resets.
    pub reset: i64,
}

impl From<RateLimitStatus> for RateLimitWindow {
    fn from(status: RateLimitStatus) -> Self {
        let reset_at = DateTime::from_timestamp(status.reset, 0).unwrap_or_else(Utc::now);
        RateLimitWindow::new(status.limit, status.remaining, reset_at)
    }
}
