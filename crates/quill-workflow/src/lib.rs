//! Step executor and publication workflow for Quill
//!
//! The workflow is a fixed, forward-only sequence of nine stages:
//!
//! ```text
//! Launch → NavigateToAuthSurface → SubmitCredentials → ConfirmAuthenticated
//!        → NavigateToTargetSurface → OpenComposer → InjectContent
//!        → SubmitContent → VerifySubmission
//! ```
//!
//! Each stage is one [`Step`]: an action run by the [`StepExecutor`] under
//! its own timeout and Retry/Backoff Policy. The first step that exhausts
//! its budget ends the run as `Failed(stage, reason)`, a failure snapshot is
//! attempted, and the session is closed.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use quill_browser::ChromeLauncher;
//! use quill_core::{Credentials, QuillConfig};
//! use quill_workflow::{publish, TracingSink};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = QuillConfig::default();
//!     let credentials = Credentials::new("me@example.com", "secret");
//!     let report = publish(
//!         &ChromeLauncher::new(),
//!         &config,
//!         "Hello from Quill",
//!         &credentials,
//!         Arc::new(TracingSink),
//!     )
//!     .await;
//!     println!("{:?}", report.outcome);
//! }
//! ```

pub mod events;
pub mod stage;
pub mod state_machine;
pub mod step;
pub mod steps;
pub mod targets;
pub mod workflow;

pub use events::{Broadcast, EventSink, RecordingSink, StepEvent, TracingSink};
pub use stage::Stage;
pub use step::{Resolution, Step, StepAction, StepExecutor, StepOutcome, StepReport};
pub use targets::SiteProfile;
pub use workflow::{
    publish, publish_with, Outcome, PublishReport, ReportSummary, Workflow, WorkflowContext,
};
