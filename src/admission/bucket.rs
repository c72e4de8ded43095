//! Token bucket with continuous refill.

use std::time::{Duration, Instant};

/// A single token bucket.
///
/// Tokens accrue continuously at `rate` per second up to `burst`, rather than
/// resetting in discrete periods, so a throttled client recovers smoothly
/// instead of bursting at period boundaries. The bucket starts full.
#[derive(Debug)]
pub struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    rate: f64,
    burst: f64,
}

impl TokenBucket {
    /// Create a full bucket refilling at `rate` tokens/second, holding at
    /// most `burst` tokens.
    pub fn new(rate: f64, burst: f64) -> Self {
        Self {
            tokens: burst,
            last_refill: Instant::now(),
            rate,
            burst,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.burst);
        self.last_refill = now;
    }

    /// Consume one token if available. Leaves the bucket unchanged (apart
    /// from refill accounting) when empty.
    pub fn try_admit(&mut self) -> bool {
        self.refill(Instant::now());
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Whole tokens currently held, clamped to >= 0.
    pub fn tokens_remaining(&mut self) -> u64 {
        self.refill(Instant::now());
        self.tokens.max(0.0).floor() as u64
    }

    /// Time until at least one token is available. Does not consume.
    pub fn time_until_next_token(&mut self) -> Duration {
        self.refill(Instant::now());
        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
    }
}
