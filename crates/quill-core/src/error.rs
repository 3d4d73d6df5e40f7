//! Unified error types for Quill

use std::time::Duration;
use thiserror::Error;

/// Unified error type for all Quill operations
#[derive(Error, Debug)]
pub enum QuillError {
    // Element resolution
    #[error("Element not found: {target}")]
    NotFound { target: String },

    // Timing
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout { operation: String, elapsed: Duration },

    // Workflow surfaces
    #[error("Authentication incomplete: {0}")]
    AuthenticationIncomplete(String),

    #[error("Navigation failed: {0}")]
    NavigationFailure(String),

    #[error("Content mismatch after injection: expected {expected} chars, found {actual} chars")]
    ContentMismatch { expected: usize, actual: usize },

    // Retry exhaustion
    #[error("{operation} failed after {attempts} attempt(s): {last}")]
    TerminalFailure {
        operation: String,
        attempts: u32,
        #[source]
        last: Box<QuillError>,
    },

    // Browser / driver errors
    #[error("Browser error: {0}")]
    Browser(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl QuillError {
    /// Shorthand for [`QuillError::NotFound`]
    pub fn not_found(target: impl Into<String>) -> Self {
        Self::NotFound {
            target: target.into(),
        }
    }

    /// Whether another attempt of the same action could plausibly succeed.
    ///
    /// An unresolved login challenge or a bad configuration will look the same
    /// on every attempt, so the Retry/Backoff Policy hands these back untouched.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            QuillError::AuthenticationIncomplete(_) | QuillError::Config(_)
        )
    }

    /// Stable short name of the error class
    pub fn kind(&self) -> &'static str {
        match self {
            QuillError::NotFound { .. } => "NotFound",
            QuillError::Timeout { .. } => "Timeout",
            QuillError::AuthenticationIncomplete(_) => "AuthenticationIncomplete",
            QuillError::NavigationFailure(_) => "NavigationFailure",
            QuillError::ContentMismatch { .. } => "ContentMismatch",
            QuillError::TerminalFailure { .. } => "TerminalFailure",
            QuillError::Browser(_) => "Browser",
            QuillError::Config(_) => "Config",
            QuillError::Io(_) => "Io",
            QuillError::Serialization(_) => "Serialization",
            QuillError::Other(_) => "Other",
        }
    }

    /// The innermost error, looking through any `TerminalFailure` wrappers
    pub fn root(&self) -> &QuillError {
        match self {
            QuillError::TerminalFailure { last, .. } => last.root(),
            other => other,
        }
    }
}

/// Result type alias using QuillError
pub type Result<T> = std::result::Result<T, QuillError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(QuillError::not_found("editor").is_retryable());
        assert!(QuillError::NavigationFailure("x".into()).is_retryable());
        assert!(!QuillError::AuthenticationIncomplete("challenge".into()).is_retryable());
        assert!(!QuillError::Config("bad".into()).is_retryable());
    }

    #[test]
    fn test_root_unwraps_terminal_failures() {
        let err = QuillError::TerminalFailure {
            operation: "outer".into(),
            attempts: 2,
            last: Box::new(QuillError::TerminalFailure {
                operation: "inner".into(),
                attempts: 3,
                last: Box::new(QuillError::not_found("submit control")),
            }),
        };
        assert_eq!(err.kind(), "TerminalFailure");
        assert_eq!(err.root().kind(), "NotFound");
    }

    #[test]
    fn test_display_includes_context() {
        let err = QuillError::Timeout {
            operation: "OpenComposer".into(),
            elapsed: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "OpenComposer timed out after 30s");
    }
}
