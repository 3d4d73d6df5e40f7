//! # quill-core
//!
//! Core types for the Quill UI publishing engine.
//!
//! Quill drives a browser through a third-party web application to publish a
//! piece of text without using the application's API. This crate holds the
//! pieces every other crate leans on:
//!
//! - [`QuillError`]: the error taxonomy shared by locator, steps and workflow
//! - [`config`]: TOML-backed configuration with defaults for every field
//! - [`poll`]: the single "poll until found or deadline" primitive
//! - [`retry`]: the bounded Retry/Backoff Policy
//! - [`fail_open`]: helpers for best-effort work (diagnostics, cleanup)

pub mod config;
mod error;
pub mod fail_open;
pub mod poll;
pub mod retry;
mod types;

pub use config::QuillConfig;
pub use error::{QuillError, Result};
pub use poll::{poll_until, PollConfig};
pub use retry::{Delay, RetryPolicy};
pub use types::*;
