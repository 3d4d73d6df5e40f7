//! Scripted in-memory page for tests
//!
//! `MockPage` is a cheap handle over shared state: the launcher hands a clone
//! to the session and the test keeps another to inspect counters afterwards.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use quill_core::config::SessionConfig;
use quill_core::{QuillError, Result};

use crate::driver::{ElementQuery, ElementRef, ElementSnapshot, PageDriver};
use crate::session::SessionLauncher;

/// Bytes returned by a successful mock screenshot
pub const MOCK_PNG: &[u8] = b"\x89PNG\r\n\x1a\nmock";

/// One scripted element
#[derive(Debug, Clone)]
pub struct MockElement {
    query: ElementQuery,
    visible: bool,
    enabled: bool,
    text: String,
    label: String,
    value: String,
    appears_after: u32,
    only_on: Option<String>,
    navigates_to: Option<String>,
    ignores_input: bool,
}

impl MockElement {
    pub fn new(query: ElementQuery) -> Self {
        Self {
            query,
            visible: true,
            enabled: true,
            text: String::new(),
            label: String::new(),
            value: String::new(),
            appears_after: 0,
            only_on: None,
            navigates_to: None,
            ignores_input: false,
        }
    }

    pub fn css(selector: &str) -> Self {
        Self::new(ElementQuery::css(selector))
    }

    pub fn xpath(expression: &str) -> Self {
        Self::new(ElementQuery::xpath(expression))
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    /// Pre-existing content of an editable element
    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    /// Absent from the first `inspections` queries for its selector
    pub fn appears_after(mut self, inspections: u32) -> Self {
        self.appears_after = inspections;
        self
    }

    /// Present only while the current URL contains `fragment`
    pub fn only_on(mut self, fragment: &str) -> Self {
        self.only_on = Some(fragment.to_string());
        self
    }

    /// Clicking changes the current URL
    pub fn navigates_to(mut self, url: &str) -> Self {
        self.navigates_to = Some(url.to_string());
        self
    }

    /// Typed or inserted text is silently dropped
    pub fn ignores_input(mut self) -> Self {
        self.ignores_input = true;
        self
    }
}

#[derive(Debug)]
struct MockState {
    url: String,
    ready_state: String,
    elements: Vec<MockElement>,
    inspections: HashMap<ElementQuery, u32>,
    failing_queries: Vec<ElementQuery>,
    navigation_failures: Vec<(String, u32)>,
    redirects: Vec<(String, String)>,
    prepare_failures: u32,
    fail_screenshot: bool,
    fail_close: bool,
    prepare_calls: u32,
    close_calls: u32,
    screenshot_calls: u32,
    navigations: Vec<String>,
    navigation_timeouts: Vec<Option<Duration>>,
    clicks: Vec<ElementRef>,
    scrolls: Vec<(i64, i64)>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            url: "about:blank".to_string(),
            ready_state: "complete".to_string(),
            elements: Vec::new(),
            inspections: HashMap::new(),
            failing_queries: Vec::new(),
            navigation_failures: Vec::new(),
            redirects: Vec::new(),
            prepare_failures: 0,
            fail_screenshot: false,
            fail_close: false,
            prepare_calls: 0,
            close_calls: 0,
            screenshot_calls: 0,
            navigations: Vec::new(),
            navigation_timeouts: Vec::new(),
            clicks: Vec::new(),
            scrolls: Vec::new(),
        }
    }
}

impl MockState {
    fn present(&self, element: &MockElement, seen: u32) -> bool {
        let on_page = element
            .only_on
            .as_ref()
            .map_or(true, |fragment| self.url.contains(fragment.as_str()));
        on_page && seen >= element.appears_after
    }

    fn resolve(&mut self, element: &ElementRef) -> Result<&mut MockElement> {
        let seen = self.inspections.get(&element.query).copied().unwrap_or(0);
        let position = self
            .elements
            .iter()
            .enumerate()
            .filter(|(_, el)| el.query == element.query && self.present(el, seen))
            .nth(element.index)
            .map(|(position, _)| position)
            .ok_or_else(|| {
                QuillError::not_found(format!(
                    "{} #{} (stale element reference)",
                    element.query, element.index
                ))
            })?;
        Ok(&mut self.elements[position])
    }
}

/// Scripted page driver
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    state: Arc<Mutex<MockState>>,
}

impl MockPage {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_element(self, element: MockElement) -> Self {
        self.add_element(element);
        self
    }

    pub fn with_url(self, url: &str) -> Self {
        self.set_url(url);
        self
    }

    pub fn with_ready_state(self, ready_state: &str) -> Self {
        self.state().ready_state = ready_state.to_string();
        self
    }

    /// The next `times` navigations to a URL containing `fragment` fail
    pub fn failing_navigation(self, fragment: &str, times: u32) -> Self {
        self.state()
            .navigation_failures
            .push((fragment.to_string(), times));
        self
    }

    /// Navigating to a URL containing `fragment` lands on `to` instead
    pub fn redirecting(self, fragment: &str, to: &str) -> Self {
        self.state()
            .redirects
            .push((fragment.to_string(), to.to_string()));
        self
    }

    /// Every inspection of `query` fails, as an invalid selector would
    pub fn failing_query(self, query: ElementQuery) -> Self {
        self.state().failing_queries.push(query);
        self
    }

    pub fn failing_prepare(self, times: u32) -> Self {
        self.state().prepare_failures = times;
        self
    }

    pub fn failing_screenshots(self) -> Self {
        self.state().fail_screenshot = true;
        self
    }

    pub fn failing_close(self) -> Self {
        self.state().fail_close = true;
        self
    }

    pub fn add_element(&self, element: MockElement) {
        self.state().elements.push(element);
    }

    pub fn set_url(&self, url: &str) {
        self.state().url = url.to_string();
    }

    pub fn url(&self) -> String {
        self.state().url.clone()
    }

    pub fn prepare_calls(&self) -> u32 {
        self.state().prepare_calls
    }

    pub fn close_calls(&self) -> u32 {
        self.state().close_calls
    }

    pub fn screenshot_calls(&self) -> u32 {
        self.state().screenshot_calls
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state().navigations.clone()
    }

    /// Per-call timeout passed with each navigation
    pub fn navigation_timeouts(&self) -> Vec<Option<Duration>> {
        self.state().navigation_timeouts.clone()
    }

    pub fn clicks(&self) -> Vec<ElementRef> {
        self.state().clicks.clone()
    }

    pub fn scrolls(&self) -> Vec<(i64, i64)> {
        self.state().scrolls.clone()
    }

    /// How many times `query` has been inspected
    pub fn inspections(&self, query: &ElementQuery) -> u32 {
        self.state().inspections.get(query).copied().unwrap_or(0)
    }

    /// Current content of the first element registered under `query`
    pub fn value_of(&self, query: &ElementQuery) -> Option<String> {
        self.state()
            .elements
            .iter()
            .find(|el| &el.query == query)
            .map(|el| el.value.clone())
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn prepare(&self) -> Result<()> {
        let mut state = self.state();
        state.prepare_calls += 1;
        if state.prepare_failures > 0 {
            state.prepare_failures -= 1;
            return Err(QuillError::Browser("mock prepare failure".into()));
        }
        Ok(())
    }

    async fn navigate(&self, url: &str, timeout: Option<Duration>) -> Result<()> {
        let mut state = self.state();
        state.navigations.push(url.to_string());
        state.navigation_timeouts.push(timeout);

        if let Some((_, remaining)) = state
            .navigation_failures
            .iter_mut()
            .find(|(fragment, remaining)| *remaining > 0 && url.contains(fragment.as_str()))
        {
            *remaining -= 1;
            return Err(QuillError::NavigationFailure(format!(
                "{}: net::ERR_TIMED_OUT",
                url
            )));
        }

        let landing = state
            .redirects
            .iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
            .map(|(_, to)| to.clone())
            .unwrap_or_else(|| url.to_string());
        state.url = landing;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.url())
    }

    async fn ready_state(&self) -> Result<String> {
        Ok(self.state().ready_state.clone())
    }

    async fn inspect(&self, query: &ElementQuery) -> Result<Vec<ElementSnapshot>> {
        let mut state = self.state();
        let counter = state.inspections.entry(query.clone()).or_insert(0);
        let seen = *counter;
        *counter += 1;

        if state.failing_queries.contains(query) {
            return Err(QuillError::Browser(format!("invalid selector: {}", query)));
        }

        let snapshots = state
            .elements
            .iter()
            .filter(|el| &el.query == query && state.present(el, seen))
            .enumerate()
            .map(|(index, el)| ElementSnapshot {
                index,
                visible: el.visible,
                enabled: el.enabled,
                text: el.text.clone(),
                label: el.label.clone(),
            })
            .collect();
        Ok(snapshots)
    }

    async fn click(&self, element: &ElementRef) -> Result<()> {
        let mut state = self.state();
        let target = state.resolve(element)?.navigates_to.clone();
        state.clicks.push(element.clone());
        if let Some(url) = target {
            state.url = url;
        }
        Ok(())
    }

    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<()> {
        let mut state = self.state();
        let el = state.resolve(element)?;
        if !el.ignores_input {
            el.value.push_str(text);
        }
        Ok(())
    }

    async fn clear(&self, element: &ElementRef) -> Result<()> {
        self.state().resolve(element)?.value.clear();
        Ok(())
    }

    async fn insert_text(&self, element: &ElementRef, text: &str) -> Result<()> {
        self.type_text(element, text).await
    }

    async fn read_text(&self, element: &ElementRef) -> Result<String> {
        Ok(self.state().resolve(element)?.value.clone())
    }

    async fn scroll_to(&self, x: i64, y: i64) -> Result<()> {
        self.state().scrolls.push((x, y));
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let mut state = self.state();
        state.screenshot_calls += 1;
        if state.fail_screenshot {
            return Err(QuillError::Browser("mock screenshot failure".into()));
        }
        Ok(MOCK_PNG.to_vec())
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state();
        state.close_calls += 1;
        if state.fail_close {
            return Err(QuillError::Browser("mock close failure".into()));
        }
        Ok(())
    }
}

/// Launcher handing out clones of one scripted page
#[derive(Debug, Clone, Default)]
pub struct MockLauncher {
    page: MockPage,
    fail_launch: bool,
    launches: Arc<AtomicU32>,
}

impl MockLauncher {
    pub fn new(page: MockPage) -> Self {
        Self {
            page,
            fail_launch: false,
            launches: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Every launch fails before a page exists
    pub fn failing() -> Self {
        Self {
            fail_launch: true,
            ..Self::default()
        }
    }

    pub fn page(&self) -> &MockPage {
        &self.page
    }

    pub fn launches(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionLauncher for MockLauncher {
    type Page = MockPage;

    async fn launch(&self, _config: &SessionConfig) -> Result<MockPage> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail_launch {
            return Err(QuillError::Browser("mock launch failure".into()));
        }
        Ok(self.page.clone())
    }
}
