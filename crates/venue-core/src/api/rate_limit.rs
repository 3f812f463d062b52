//! Token-bucket rate limiter shared across Data API reads.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Refill-on-read token bucket. Not a crate dependency — small enough to
/// own directly, and the two limits (per-second, per-minute) compose as
/// two independent buckets checked together.
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_per_sec: f64,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
            capacity: capacity as f64,
            refill_per_sec,
        }
    }

    /// Block (async sleep) until a token is available, then consume one.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().unwrap();
                let elapsed = state.last_refill.elapsed().as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
                state.last_refill = Instant::now();

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    let deficit = 1.0 - state.tokens;
                    Some(Duration::from_secs_f64(deficit / self.refill_per_sec))
                }
            };

            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }
}

/// Two independent buckets: a short per-second burst limit and a longer
/// per-minute sustained limit. Both must admit a request before it proceeds.
pub struct DataApiLimiter {
    per_second: TokenBucket,
    per_minute: TokenBucket,
}

impl DataApiLimiter {
    /// Venue's Data API: at most 5 req/s, 100 req/min.
    pub fn new() -> Self {
        Self {
            per_second: TokenBucket::new(5, 5.0),
            per_minute: TokenBucket::new(100, 100.0 / 60.0),
        }
    }

    pub async fn acquire(&self) {
        self.per_second.acquire().await;
        self.per_minute.acquire().await;
    }
}

impl Default for DataApiLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bucket_allows_burst_up_to_capacity() {
        let bucket = TokenBucket::new(3, 1.0);
        let start = Instant::now();
        bucket.acquire().await;
        bucket.acquire().await;
        bucket.acquire().await;
        // Three tokens available immediately, no sleep required.
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_bucket_throttles_past_capacity() {
        let bucket = TokenBucket::new(1, 10.0);
        bucket.acquire().await;
        let start = Instant::now();
        bucket.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
