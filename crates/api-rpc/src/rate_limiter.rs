//! Rate Limiter (Token Bucket Algorithm)
//!
//! Caps the request rate on mutating RPC methods.

use std::time::Instant;

use tokio::sync::Mutex;

/// Token bucket rate limiter
pub struct RateLimiter {
    state: Mutex<Bucket>,
    max_tokens: u32,
    refill_rate: u32, // tokens per second
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    /// * `max_tokens` - Maximum burst size
    /// * `refill_rate` - Tokens added per second
    pub fn new(max_tokens: u32, refill_rate: u32) -> Self {
        Self {
            state: Mutex::new(Bucket {
                tokens: max_tokens as f64,
                last_refill: Instant::now(),
            }),
            max_tokens,
            refill_rate,
        }
    }

    /// Consume one token; false when rate limited
    pub async fn check(&self) -> bool {
        let mut bucket = self.state.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();

        bucket.tokens =
            (bucket.tokens + elapsed * self.refill_rate as f64).min(self.max_tokens as f64);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Remaining tokens (for monitoring)
    #[allow(dead_code)]
    pub async fn remaining(&self) -> f64 {
        self.state.lock().await.tokens
    }
}
