//! Page driver abstraction
//!
//! Everything the engine does to a page goes through [`PageDriver`], so the
//! locator, steps and workflow run the same against Chrome and against the
//! scripted [`MockPage`](crate::mock::MockPage).

use std::time::Duration;

use async_trait::async_trait;
use quill_core::Result;
use serde::{Deserialize, Serialize};

/// Structural query against the current DOM
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ElementQuery {
    /// `document.querySelectorAll`
    Css(String),
    /// `document.evaluate` ordered snapshot
    #[serde(rename = "xpath")]
    XPath(String),
}

impl ElementQuery {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::XPath(expression.into())
    }

    pub fn expression(&self) -> &str {
        match self {
            ElementQuery::Css(s) | ElementQuery::XPath(s) => s,
        }
    }
}

impl std::fmt::Display for ElementQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementQuery::Css(s) => write!(f, "css:{}", s),
            ElementQuery::XPath(s) => write!(f, "xpath:{}", s),
        }
    }
}

/// Position of one match within a query result.
///
/// Only meaningful against the DOM the query ran on; any navigation or
/// mutation may point it at a different node or at nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pub query: ElementQuery,
    pub index: usize,
}

/// Rendered state of one element, as observed by `inspect`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    /// Position within the query result
    pub index: usize,
    /// Non-zero box, not `visibility: hidden`, not `display: none`
    pub visible: bool,
    /// Not `disabled`, not `aria-disabled="true"`, no `disabled` class
    pub enabled: bool,
    /// Trimmed visible text
    #[serde(default)]
    pub text: String,
    /// `aria-label`, `placeholder`, `data-placeholder` or `title`
    #[serde(default)]
    pub label: String,
}

/// Operations on the single page of a session
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Apply session-level page settings (timeouts, user agent, headers)
    async fn prepare(&self) -> Result<()>;

    /// Navigate and wait for the navigation to commit, within `timeout` or
    /// the page's default navigation budget
    async fn navigate(&self, url: &str, timeout: Option<Duration>) -> Result<()>;

    /// URL of the current document
    async fn current_url(&self) -> Result<String>;

    /// `document.readyState`
    async fn ready_state(&self) -> Result<String>;

    /// Every element matching `query`, in document order
    async fn inspect(&self, query: &ElementQuery) -> Result<Vec<ElementSnapshot>>;

    /// Scroll the element into view and click it
    async fn click(&self, element: &ElementRef) -> Result<()>;

    /// Focus the element and type `text` key by key
    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<()>;

    /// Focus the element, select all of its content and delete it
    async fn clear(&self, element: &ElementRef) -> Result<()>;

    /// Focus the element and insert `text` at the caret in one edit
    async fn insert_text(&self, element: &ElementRef, text: &str) -> Result<()>;

    /// Current value (form fields) or visible text (everything else)
    async fn read_text(&self, element: &ElementRef) -> Result<String>;

    /// Scroll the window to an absolute position
    async fn scroll_to(&self, x: i64, y: i64) -> Result<()>;

    /// PNG snapshot of the whole page
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Release the page and its browser
    async fn close(&self) -> Result<()>;
}
