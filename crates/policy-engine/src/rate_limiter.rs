//! Per-wallet sliding hour/day rate limiting. Counters increment only on
//! successful execution (the Coordinator's job) — this module just tracks
//! and checks them.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

#[derive(Debug, Clone, Copy, Default)]
struct WindowCounter {
    count: u32,
    window_start: Option<DateTime<Utc>>,
}

impl WindowCounter {
    fn reset_if_expired(&mut self, now: DateTime<Utc>, window: chrono::Duration) {
        match self.window_start {
            Some(start) if now.signed_duration_since(start) < window => {}
            _ => {
                self.count = 0;
                self.window_start = Some(now);
            }
        }
    }
}

/// Tracks per-wallet `(hourly, daily)` counters. Cheap to clone — holds an
/// `Arc`-free `DashMap` directly since `RateLimiter` itself is shared via
/// `Arc` at the call site.
#[derive(Default)]
pub struct RateLimiter {
    hourly: DashMap<String, WindowCounter>,
    daily: DashMap<String, WindowCounter>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if either window is already at its configured cap.
    pub fn is_at_cap(&self, wallet: &str, per_hour: Option<u32>, per_day: Option<u32>) -> bool {
        let now = Utc::now();

        if let Some(cap) = per_hour {
            let mut entry = self.hourly.entry(wallet.to_string()).or_default();
            entry.reset_if_expired(now, chrono::Duration::hours(1));
            if entry.count >= cap {
                return true;
            }
        }

        if let Some(cap) = per_day {
            let mut entry = self.daily.entry(wallet.to_string()).or_default();
            entry.reset_if_expired(now, chrono::Duration::days(1));
            if entry.count >= cap {
                return true;
            }
        }

        false
    }

    /// Called once per successfully executed trade for this wallet.
    pub fn record_execution(&self, wallet: &str) {
        let now = Utc::now();

        let mut hourly = self.hourly.entry(wallet.to_string()).or_default();
        hourly.reset_if_expired(now, chrono::Duration::hours(1));
        hourly.count += 1;
        drop(hourly);

        let mut daily = self.daily.entry(wallet.to_string()).or_default();
        daily.reset_if_expired(now, chrono::Duration::days(1));
        daily.count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_at_cap_when_no_limits_configured() {
        let limiter = RateLimiter::new();
        assert!(!limiter.is_at_cap("0xw", None, None));
    }

    #[test]
    fn test_hits_hourly_cap() {
        let limiter = RateLimiter::new();
        for _ in 0..3 {
            limiter.record_execution("0xw");
        }
        assert!(limiter.is_at_cap("0xw", Some(3), None));
        assert!(!limiter.is_at_cap("0xw", Some(4), None));
    }

    #[test]
    fn test_hits_daily_cap() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            limiter.record_execution("0xw");
        }
        assert!(limiter.is_at_cap("0xw", None, Some(5)));
        assert!(!limiter.is_at_cap("0xw", None, Some(6)));
    }

    #[test]
    fn test_counters_are_independent_per_wallet() {
        let limiter = RateLimiter::new();
        limiter.record_execution("0xa");
        assert!(!limiter.is_at_cap("0xb", Some(1), None));
    }
}
