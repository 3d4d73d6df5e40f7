//! Browser session, element location and failure diagnostics for Quill
//!
//! This crate owns everything that touches a page:
//!
//! - [`driver`]: the [`PageDriver`] seam every other layer talks to
//! - [`chrome`]: the Chrome DevTools Protocol driver (headless_chrome)
//! - [`mock`]: a scripted in-memory driver for tests
//! - [`locator`]: the Element Locator and its ordered fallback strategies
//! - [`session`]: scoped session acquisition with guaranteed close
//! - [`diagnostics`]: best-effort failure screenshots
//!
//! # Example
//!
//! ```no_run
//! use futures::FutureExt;
//! use quill_browser::{with_session, ChromeLauncher, Locator, TargetDescriptor, Visibility};
//! use quill_core::config::SessionConfig;
//! use quill_core::PollConfig;
//!
//! # async fn example() -> quill_core::Result<()> {
//! let editor = TargetDescriptor::new("editor")
//!     .attribute(".ql-editor[contenteditable='true']")
//!     .structural("//div[@contenteditable='true']");
//!
//! with_session(&ChromeLauncher::new(), &SessionConfig::default(), |session| {
//!     let editor = editor.clone();
//!     async move {
//!         let found = Locator::new(session.page())
//!             .require(&editor, Visibility::Visible, None, PollConfig::from_millis(1000, 10_000))
//!             .await?;
//!         println!("editor resolved by {} strategy", found.strategy_kind);
//!         Ok(())
//!     }
//!     .boxed()
//! })
//! .await
//! # }
//! ```

pub mod chrome;
pub mod diagnostics;
pub mod driver;
pub mod locator;
pub mod mock;
pub mod scripts;
pub mod session;

pub use chrome::{ChromeLauncher, ChromePage};
pub use diagnostics::{DiagnosticsReporter, DiagnosticsResult};
pub use driver::{ElementQuery, ElementRef, ElementSnapshot, PageDriver};
pub use locator::{Locator, ResolvedElement, Strategy, TargetDescriptor, TextFilter, Visibility};
pub use session::{with_session, Session, SessionLauncher};
