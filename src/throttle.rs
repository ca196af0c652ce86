// src/throttle.rs
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::sync::Arc;
use std::time::Duration;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Paces a loop to at most one pass per period (token bucket, burst of one).
#[derive(Clone)]
pub struct Throttle {
    limiter: Option<Arc<DirectRateLimiter>>,
}

impl Throttle {
    /// A zero period disables throttling.
    pub fn every(period: Duration) -> Self {
        match Quota::with_period(period) {
            Some(quota) => Self {
                limiter: Some(Arc::new(RateLimiter::direct(quota))),
            },
            None => Self::unlimited(),
        }
    }

    pub fn unlimited() -> Self {
        Self { limiter: None }
    }

    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}
