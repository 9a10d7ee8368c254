//! Bounded retry of engine operations.
//!
//! # Responsibilities
//! - Run an async operation at most `max_attempts` times
//! - Sleep on a `Backoff` schedule between attempts
//! - Report how many attempts were spent
//!
//! # Design Decisions
//! - The bound is fixed at construction; there is no retry-forever mode
//! - The last error is returned unchanged

use std::future::Future;

use crate::resilience::backoff::Backoff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

/// Outcome of a retried operation.
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: T,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::new(base_delay_ms, max_delay_ms),
        }
    }

    /// Calls `op` until it succeeds or the attempt budget is spent.
    pub async fn run<F, Fut, T, E>(&self, operation: &str, mut op: F) -> Attempted<Result<T, E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match op().await {
                Ok(value) => return Attempted { result: Ok(value), attempts },
                Err(e) if attempts < self.max_attempts => {
                    let delay = self.backoff.delay(attempts);
                    tracing::warn!(
                        operation,
                        attempt = attempts,
                        delay = ?delay,
                        error = %e,
                        "Retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Attempted { result: Err(e), attempts },
            }
        }
    }
}
