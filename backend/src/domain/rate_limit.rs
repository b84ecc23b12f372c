//! Per-key token bucket with a sliding-window hard cap.
//!
//! Every account (or peer IP when unauthenticated) gets an independent
//! bucket. Two mechanisms combine:
//!
//! - a **sliding window**: more than `requests_per_minute` timestamps inside
//!   the trailing 60 s always rejects, independent of tokens;
//! - a **token bucket**: tokens refill at `requests_per_minute / 60_000` per
//!   millisecond, capped at `burst`, bounding short bursts below the window
//!   cap.
//!
//! Rejections report the seconds until the oldest in-window timestamp ages
//! out, surfaced to clients as `Retry-After`.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

/// How often callers should run [`RateLimiter::sweep_idle`].
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Idle time after which a key's bucket is evicted.
pub const IDLE_EVICTION: Duration = Duration::from_secs(600);

/// Limiter parameters.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    pub requests_per_minute: u32,
    pub burst: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst: 30,
        }
    }
}

/// Rejection detail: whole seconds until the caller may retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAfter {
    pub seconds: u64,
}

#[derive(Debug)]
struct Bucket {
    stamps: VecDeque<Instant>,
    tokens: f64,
    refilled_at: Instant,
    last_seen: Instant,
}

impl Bucket {
    fn new(now: Instant, burst: u32) -> Self {
        Self {
            stamps: VecDeque::new(),
            tokens: f64::from(burst),
            refilled_at: now,
            last_seen: now,
        }
    }
}

/// Shared per-process rate limiter.
pub struct RateLimiter {
    config: RateLimiterConfig,
    buckets: StdMutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    /// Create a limiter with the given parameters.
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            buckets: StdMutex::new(HashMap::new()),
        }
    }

    /// Try to consume one request slot for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RetryAfter`] when the sliding window is full or the bucket
    /// has no tokens.
    pub fn consume(&self, key: &str) -> Result<(), RetryAfter> {
        self.consume_at(key, Instant::now())
    }

    fn consume_at(&self, key: &str, now: Instant) -> Result<(), RetryAfter> {
        let mut buckets = self.buckets.lock().expect("rate limiter state poisoned");
        let bucket = buckets
            .entry(key.to_owned())
            .or_insert_with(|| Bucket::new(now, self.config.burst));
        bucket.last_seen = now;

        while let Some(oldest) = bucket.stamps.front() {
            if now.duration_since(*oldest) >= WINDOW {
                bucket.stamps.pop_front();
            } else {
                break;
            }
        }

        if bucket.stamps.len() >= self.config.requests_per_minute as usize {
            let oldest = *bucket
                .stamps
                .front()
                .expect("window rejection implies a recorded timestamp");
            return Err(RetryAfter {
                seconds: seconds_until_aged_out(oldest, now),
            });
        }

        let refill_rate_per_ms = f64::from(self.config.requests_per_minute) / 60_000.0;
        let elapsed_ms = now.duration_since(bucket.refilled_at).as_millis() as f64;
        bucket.tokens =
            (bucket.tokens + elapsed_ms * refill_rate_per_ms).min(f64::from(self.config.burst));
        bucket.refilled_at = now;

        if bucket.tokens < 1.0 {
            let retry_after = match bucket.stamps.front() {
                Some(oldest) => seconds_until_aged_out(*oldest, now),
                None => 1,
            };
            return Err(RetryAfter {
                seconds: retry_after,
            });
        }

        bucket.tokens -= 1.0;
        bucket.stamps.push_back(now);
        Ok(())
    }

    /// Evict buckets idle for longer than [`IDLE_EVICTION`].
    ///
    /// Returns the number of keys removed. Intended to run on a
    /// [`SWEEP_INTERVAL`] cadence.
    pub fn sweep_idle(&self) -> usize {
        self.sweep_idle_at(Instant::now())
    }

    fn sweep_idle_at(&self, now: Instant) -> usize {
        let mut buckets = self.buckets.lock().expect("rate limiter state poisoned");
        let before = buckets.len();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_seen) < IDLE_EVICTION);
        before - buckets.len()
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.buckets
            .lock()
            .expect("rate limiter state poisoned")
            .len()
    }
}

/// Whole seconds until `oldest` leaves the window, rounded up and at least 1.
fn seconds_until_aged_out(oldest: Instant, now: Instant) -> u64 {
    let remaining = WINDOW.saturating_sub(now.duration_since(oldest));
    remaining.as_secs_f64().ceil().max(1.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(rpm: u32, burst: u32) -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            requests_per_minute: rpm,
            burst,
        })
    }

    #[test]
    fn allows_up_to_burst_immediately() {
        let limiter = limiter(60, 5);
        let now = Instant::now();
        for _ in 0..5 {
            limiter.consume_at("acct", now).expect("within burst");
        }
        let rejection = limiter
            .consume_at("acct", now)
            .expect_err("burst exhausted");
        assert!(rejection.seconds >= 1);
    }

    #[test]
    fn tokens_refill_with_elapsed_time() {
        let limiter = limiter(60, 2);
        let start = Instant::now();
        limiter.consume_at("acct", start).expect("first");
        limiter.consume_at("acct", start).expect("second");
        assert!(limiter.consume_at("acct", start).is_err());

        // 60 rpm refills one token per second.
        let later = start + Duration::from_millis(1100);
        limiter.consume_at("acct", later).expect("token refilled");
    }

    #[test]
    fn window_rejects_when_full_regardless_of_tokens() {
        let limiter = limiter(3, 100);
        let start = Instant::now();
        for i in 0..3 {
            limiter
                .consume_at("acct", start + Duration::from_secs(i))
                .expect("within window");
        }
        let rejection = limiter
            .consume_at("acct", start + Duration::from_secs(3))
            .expect_err("window full");
        // Oldest stamp ages out 57 s later.
        assert_eq!(rejection.seconds, 57);
        assert!(rejection.seconds <= 60);
    }

    #[test]
    fn window_slides_and_admits_again() {
        let limiter = limiter(2, 100);
        let start = Instant::now();
        limiter.consume_at("acct", start).expect("first");
        limiter
            .consume_at("acct", start + Duration::from_secs(1))
            .expect("second");
        assert!(
            limiter
                .consume_at("acct", start + Duration::from_secs(2))
                .is_err()
        );

        limiter
            .consume_at("acct", start + Duration::from_secs(61))
            .expect("oldest aged out");
    }

    #[test]
    fn keys_are_isolated() {
        let limiter = limiter(60, 1);
        let now = Instant::now();
        limiter.consume_at("alpha", now).expect("alpha");
        limiter.consume_at("beta", now).expect("beta unaffected");
    }

    #[test]
    fn idle_keys_are_swept() {
        let limiter = limiter(60, 5);
        let start = Instant::now();
        limiter.consume_at("stale", start).expect("recorded");
        limiter
            .consume_at("fresh", start + IDLE_EVICTION)
            .expect("recorded");

        let removed = limiter.sweep_idle_at(start + IDLE_EVICTION + Duration::from_secs(1));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }
}
