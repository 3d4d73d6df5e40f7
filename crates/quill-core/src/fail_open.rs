//! Fail-open helper for best-effort work
//!
//! Diagnostics capture, session teardown and the post-submit confirmation
//! check must never turn a result into a different failure. Wrap them here.
//!
//! DO NOT use fail-open for workflow steps: a step failure is the outcome.

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Execute an operation that should fail open
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
///
/// ```no_run
/// use quill_core::fail_open::fail_open;
/// use quill_core::Result;
///
/// async fn remove_scratch_profile() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() {
///     let cleaned = fail_open("profile_cleanup", || remove_scratch_profile()).await;
///     // cleaned is None if the cleanup failed
/// }
/// ```
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}
