// src/retry.rs
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Bounded retry with a per-attempt delay.
#[derive(Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Delay to wait after the given (1-based) failed attempt.
    pub delay: fn(u32) -> Duration,
}

fn linear_two_seconds(attempt: u32) -> Duration {
    Duration::from_secs(2 * attempt as u64)
}

#[cfg(test)]
fn no_delay(_: u32) -> Duration {
    Duration::ZERO
}

impl RetryPolicy {
    /// 3 attempts, waiting 2s then 4s between them.
    pub fn linear() -> Self {
        Self {
            attempts: 3,
            delay: linear_two_seconds,
        }
    }

    #[cfg(test)]
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            delay: no_delay,
        }
    }

    /// Run `op` until it succeeds or attempts run out. Returns the last error
    /// together with the number of attempts made.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, (E, u32)>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    let wait = (self.delay)(attempt);
                    warn!(
                        "⚠️ {} failed (attempt {}): {}. Retrying in {:?}...",
                        label, attempt, e, wait
                    );
                    sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err((e, attempt)),
            }
        }
    }
}
