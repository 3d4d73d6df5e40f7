//! Session Manager
//!
//! A [`Session`] is the one browser/page handle of a workflow run. It only
//! exists inside [`with_session`], which closes it exactly once on every exit
//! path: normal return, error return, or a panic in the body.

use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use quill_core::config::SessionConfig;
use quill_core::fail_open::fail_open;
use quill_core::Result;
use tracing::{debug, info};

use crate::driver::PageDriver;

/// Opens the browser and its page for one session
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    type Page: PageDriver + 'static;

    async fn launch(&self, config: &SessionConfig) -> Result<Self::Page>;
}

/// Exclusively-owned handle to one live page
pub struct Session<P: PageDriver> {
    page: P,
}

impl<P: PageDriver> Session<P> {
    pub fn page(&self) -> &P {
        &self.page
    }

    /// Consumes the session, so a second close cannot be expressed
    async fn close(self) {
        if fail_open("session_close", || self.page.close()).await.is_some() {
            debug!("Session closed");
        }
    }
}

/// Run `body` against a freshly launched session, then close it.
///
/// A launch failure is returned as-is and nothing is closed, since no page
/// was ever handed out. Close failures are logged and never replace the
/// body's result. A panic in `body` is re-raised after the close.
///
/// ```no_run
/// use futures::FutureExt;
/// use quill_browser::{with_session, ChromeLauncher, PageDriver};
/// use quill_core::config::SessionConfig;
///
/// # async fn example() -> quill_core::Result<()> {
/// let url = with_session(&ChromeLauncher::new(), &SessionConfig::default(), |session| {
///     async move {
///         session.page().navigate("https://example.com", None).await?;
///         session.page().current_url().await
///     }
///     .boxed()
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_session<L, T, F>(launcher: &L, config: &SessionConfig, body: F) -> Result<T>
where
    L: SessionLauncher,
    F: for<'s> FnOnce(&'s Session<L::Page>) -> BoxFuture<'s, Result<T>>,
{
    let page = launcher.launch(config).await?;
    info!("Session opened");
    let session = Session { page };

    let outcome = AssertUnwindSafe(body(&session)).catch_unwind().await;
    session.close().await;

    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
