// src/retry.rs
//! Bounded exponential backoff, kept apart from any transport call.

use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial: Duration,
    pub factor: f64,
    pub cap: Duration,
}

impl RetryPolicy {
    /// Certificate-search schedule: 5 attempts, 1.5s doubling, capped at 20s.
    pub const fn ctlog() -> Self {
        Self {
            max_attempts: 5,
            initial: Duration::from_millis(1_500),
            factor: 2.0,
            cap: Duration::from_secs(20),
        }
    }

    /// Delay after the failed attempt with 0-based index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let mult = self.factor.max(1.0).powi(attempt.min(64) as i32);
        let secs = (self.initial.as_secs_f64() * mult).min(self.cap.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    /// The full schedule: one delay per attempt, non-decreasing, never above `cap`.
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts).map(|a| self.delay_for(a))
    }
}

/// Outcome of one attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    /// Try again; the string is logged.
    Retry(String),
}

/// Run `op` until it returns `Done` or the attempts are exhausted (`None`).
/// Sleeps `policy.delay_for(n)` between attempts; no sleep after the last one.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Option<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let attempts = policy.max_attempts.max(1);
    for attempt in 0..attempts {
        match op(attempt).await {
            Attempt::Done(v) => return Some(v),
            Attempt::Retry(reason) => {
                if attempt + 1 == attempts {
                    tracing::warn!(label, attempts, %reason, "giving up after retries");
                    break;
                }
                let delay = policy.delay_for(attempt);
                metrics::counter!("harvest_retries_total", "label" => label.to_string()).increment(1);
                tracing::debug!(label, attempt, ?delay, %reason, "retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
    None
}
