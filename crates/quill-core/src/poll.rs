//! Poll-until-found primitive
//!
//! Every wait in Quill (element rendering, ready state, post-login redirects,
//! confirmation toasts) goes through [`poll_until`]. Each probe and each
//! interval sleep is a suspension point; nothing blocks the runtime.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

use crate::Result;

/// Interval and deadline for a bounded poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Pause between two probes
    pub interval: Duration,
    /// Total time budget, measured from the first probe
    pub timeout: Duration,
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Probe exactly once, no waiting
    pub fn once() -> Self {
        Self {
            interval: Duration::ZERO,
            timeout: Duration::ZERO,
        }
    }

    pub fn from_millis(interval_ms: u64, timeout_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
        )
    }
}

/// Run `probe` until it yields `Some`, it errors, or the deadline passes.
///
/// The probe always runs at least once. It receives the 1-based cycle number.
/// Returns `Ok(None)` when the deadline elapses without a value; errors from
/// the probe are propagated immediately.
pub async fn poll_until<F, Fut, T>(label: &str, config: PollConfig, mut probe: F) -> Result<Option<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + config.timeout;
    let mut cycle = 0u32;

    loop {
        cycle += 1;
        if let Some(value) = probe(cycle).await? {
            trace!("{} satisfied on cycle {}", label, cycle);
            return Ok(Some(value));
        }

        let now = Instant::now();
        if now >= deadline {
            trace!("{} gave up after {} cycle(s)", label, cycle);
            return Ok(None);
        }

        let remaining = deadline - now;
        tokio::time::sleep(config.interval.min(remaining)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QuillError;

    #[tokio::test]
    async fn test_poll_returns_first_value() {
        let mut calls = 0;
        let found = poll_until("value", PollConfig::from_millis(1, 200), |cycle| {
            calls += 1;
            async move { Ok(if cycle == 3 { Some(cycle) } else { None }) }
        })
        .await
        .unwrap();

        assert_eq!(found, Some(3));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_poll_gives_up_after_deadline() {
        let started = Instant::now();
        let found: Option<()> = poll_until("never", PollConfig::from_millis(5, 30), |_| async {
            Ok(None)
        })
        .await
        .unwrap();

        assert!(found.is_none());
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_poll_once_probes_a_single_time() {
        let mut calls = 0;
        let found: Option<()> = poll_until("once", PollConfig::once(), |_| {
            calls += 1;
            async { Ok(None) }
        })
        .await
        .unwrap();

        assert!(found.is_none());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_poll_propagates_probe_errors() {
        let result: Result<Option<()>> = poll_until("broken", PollConfig::from_millis(1, 100), |_| async {
            Err(QuillError::Browser("connection reset".into()))
        })
        .await;

        assert!(matches!(result, Err(QuillError::Browser(_))));
    }
}
