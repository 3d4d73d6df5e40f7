//! Bounded Retry/Backoff Policy
//!
//! Attempts run strictly one after another. A success short-circuits; once
//! the last attempt fails the caller gets a single
//! [`QuillError::TerminalFailure`] carrying the last underlying error.
//! Errors that [`QuillError::is_retryable`] rejects are returned as-is on
//! the attempt that produced them.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{QuillError, Result};

/// Delay schedule between failed attempts
#[derive(Debug, Clone, Copy)]
pub enum Delay {
    /// Same pause after every failure
    Fixed(Duration),
    /// `initial + step * (n - 1)` after the n-th failure
    Incremental { initial: Duration, step: Duration },
    /// Caller-provided schedule, given the number of the attempt that failed
    Custom(fn(u32) -> Duration),
}

impl Delay {
    /// Pause to observe after `failed_attempt` (1-based) has failed
    pub fn after(&self, failed_attempt: u32) -> Duration {
        match self {
            Delay::Fixed(d) => *d,
            Delay::Incremental { initial, step } => {
                *initial + step.saturating_mul(failed_attempt.saturating_sub(1))
            }
            Delay::Custom(f) => f(failed_attempt),
        }
    }
}

/// Retry policy: attempt budget plus delay schedule
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Delay,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Delay) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// `max_attempts` tries with a fixed pause between them
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, Delay::Fixed(delay))
    }

    /// A single attempt, no retries
    pub fn once() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Run `action` under this policy.
    ///
    /// `action` receives the 1-based attempt number. A budget of zero is
    /// treated as one attempt.
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut action: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match action(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}/{}", operation, attempt, max_attempts);
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => {
                    debug!("{} hit a non-retryable error: {}", operation, e);
                    return Err(e);
                }
                Err(e) if attempt >= max_attempts => {
                    warn!(
                        "{} failed after {} attempt(s): {}",
                        operation, max_attempts, e
                    );
                    return Err(QuillError::TerminalFailure {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    let pause = self.delay.after(attempt);
                    debug!(
                        "{} attempt {}/{} failed: {} (retrying in {:?})",
                        operation, attempt, max_attempts, e, pause
                    );
                    tokio::time::sleep(pause).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::fixed(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_success_on_last_attempt() {
        let mut invocations = 0;
        let result = fast(4)
            .execute("flaky", |attempt| {
                invocations += 1;
                async move {
                    if attempt < 4 {
                        Err(QuillError::not_found("button"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 4);
        assert_eq!(invocations, 4);
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let mut invocations = 0;
        let result = fast(5)
            .execute("steady", |_| {
                invocations += 1;
                async { Ok::<_, QuillError>("done") }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(invocations, 1);
    }

    #[tokio::test]
    async fn test_exhaustion_yields_single_terminal_failure() {
        let mut invocations = 0;
        let result: Result<()> = fast(3)
            .execute("broken", |attempt| {
                invocations += 1;
                async move { Err(QuillError::Other(format!("failure #{}", attempt))) }
            })
            .await;

        assert_eq!(invocations, 3);
        match result {
            Err(QuillError::TerminalFailure {
                operation,
                attempts,
                last,
            }) => {
                assert_eq!(operation, "broken");
                assert_eq!(attempts, 3);
                assert_eq!(last.to_string(), "failure #3");
            }
            other => panic!("expected TerminalFailure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let mut invocations = 0;
        let result: Result<()> = fast(5)
            .execute("login", |_| {
                invocations += 1;
                async { Err(QuillError::AuthenticationIncomplete("challenge".into())) }
            })
            .await;

        assert_eq!(invocations, 1);
        assert!(matches!(result, Err(QuillError::AuthenticationIncomplete(_))));
    }

    #[tokio::test]
    async fn test_zero_budget_runs_once() {
        let mut invocations = 0;
        let result: Result<()> = RetryPolicy::fixed(0, Duration::ZERO)
            .execute("zero", |_| {
                invocations += 1;
                async { Err(QuillError::Other("nope".into())) }
            })
            .await;

        assert_eq!(invocations, 1);
        assert!(matches!(result, Err(QuillError::TerminalFailure { attempts: 1, .. })));
    }

    #[test]
    fn test_delay_schedules() {
        assert_eq!(Delay::Fixed(Duration::from_secs(3)).after(7), Duration::from_secs(3));

        let incremental = Delay::Incremental {
            initial: Duration::from_millis(100),
            step: Duration::from_millis(50),
        };
        assert_eq!(incremental.after(1), Duration::from_millis(100));
        assert_eq!(incremental.after(3), Duration::from_millis(200));

        fn doubling(n: u32) -> Duration {
            Duration::from_millis(10 * 2u64.pow(n))
        }
        assert_eq!(Delay::Custom(doubling).after(2), Duration::from_millis(40));
    }
}
