//! Diagnostics Reporter
//!
//! Captures a full-page PNG when a run ends in a failed state. Capture is
//! best-effort: every failure comes back as [`DiagnosticsResult::CaptureFailed`]
//! and is logged, never raised.

use std::path::{Path, PathBuf};

use chrono::Utc;
use quill_core::config::DiagnosticsConfig;
use quill_core::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::driver::PageDriver;

/// What happened to the failure snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticsResult {
    Captured(PathBuf),
    CaptureFailed(String),
}

impl DiagnosticsResult {
    pub fn path(&self) -> Option<&Path> {
        match self {
            DiagnosticsResult::Captured(path) => Some(path),
            DiagnosticsResult::CaptureFailed(_) => None,
        }
    }
}

impl std::fmt::Display for DiagnosticsResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticsResult::Captured(path) => write!(f, "screenshot saved to {}", path.display()),
            DiagnosticsResult::CaptureFailed(reason) => write!(f, "screenshot not captured: {}", reason),
        }
    }
}

/// Writes `{prefix}-error-{stage}-{timestamp}.png` into `dir`
#[derive(Debug, Clone)]
pub struct DiagnosticsReporter {
    dir: PathBuf,
    prefix: String,
}

impl DiagnosticsReporter {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// `None` when diagnostics are disabled
    pub fn from_config(config: &DiagnosticsConfig, prefix: &str) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(config.dir.clone(), prefix))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(&self, stage: &str) -> String {
        format!(
            "{}-error-{}-{}.png",
            self.prefix,
            stage,
            Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
        )
    }

    /// Snapshot the page for the failed `stage`. Never fails.
    pub async fn capture_on_failure<P>(&self, page: &P, stage: &str) -> DiagnosticsResult
    where
        P: PageDriver + ?Sized,
    {
        match self.capture(page, stage).await {
            Ok(path) => {
                info!("Error screenshot saved: {}", path.display());
                DiagnosticsResult::Captured(path)
            }
            Err(e) => {
                warn!("Failed to capture error screenshot (ignored): {}", e);
                DiagnosticsResult::CaptureFailed(e.to_string())
            }
        }
    }

    async fn capture<P>(&self, page: &P, stage: &str) -> Result<PathBuf>
    where
        P: PageDriver + ?Sized,
    {
        let data = page.screenshot().await?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(self.file_name(stage));
        tokio::fs::write(&path, &data).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockPage, MOCK_PNG};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_capture_writes_named_png() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("shots");
        let reporter = DiagnosticsReporter::new(&dir, "linkedin");
        let page = MockPage::new();

        let result = reporter.capture_on_failure(&page, "OpenComposer").await;

        let path = result.path().unwrap().to_path_buf();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("linkedin-error-OpenComposer-"));
        assert!(name.ends_with(".png"));
        assert_eq!(std::fs::read(&path).unwrap(), MOCK_PNG);
        assert_eq!(page.screenshot_calls(), 1);
    }

    #[tokio::test]
    async fn test_capture_failure_is_reported_not_raised() {
        let temp = TempDir::new().unwrap();
        let reporter = DiagnosticsReporter::new(temp.path(), "linkedin");
        let page = MockPage::new().failing_screenshots();

        let result = reporter.capture_on_failure(&page, "Launch").await;

        assert!(matches!(result, DiagnosticsResult::CaptureFailed(ref r) if r.contains("screenshot")));
        assert!(std::fs::read_dir(temp.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_disabled_config_yields_no_reporter() {
        let mut config = DiagnosticsConfig::default();
        assert!(DiagnosticsReporter::from_config(&config, "x").is_some());
        config.enabled = false;
        assert!(DiagnosticsReporter::from_config(&config, "x").is_none());
    }
}
