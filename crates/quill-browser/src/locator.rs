//! Element Locator
//!
//! Resolves a logical target to one concrete element. A [`TargetDescriptor`]
//! lists strategies in priority order; each strategy is one structural query
//! plus an optional label predicate. The first strategy with at least one
//! admissible element wins, and within it the first such element in document
//! order. Later strategies are never consulted once one matches.

use quill_core::{poll_until, PollConfig, QuillError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::driver::{ElementQuery, ElementRef, ElementSnapshot, PageDriver};

/// One heuristic for finding a logical target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    /// Attribute/CSS match (`input#username`, `[aria-label="Post"]`)
    Attribute { css: String },
    /// Candidates under `scope` whose text or accessible label contains one
    /// of `labels` (case-insensitive)
    Label { scope: String, labels: Vec<String> },
    /// XPath over document structure
    Structural { xpath: String },
}

impl Strategy {
    pub fn kind(&self) -> &'static str {
        match self {
            Strategy::Attribute { .. } => "attribute",
            Strategy::Label { .. } => "label",
            Strategy::Structural { .. } => "structural",
        }
    }

    pub fn query(&self) -> ElementQuery {
        match self {
            Strategy::Attribute { css } => ElementQuery::css(css.as_str()),
            Strategy::Label { scope, .. } => ElementQuery::css(scope.as_str()),
            Strategy::Structural { xpath } => ElementQuery::xpath(xpath.as_str()),
        }
    }

    fn admits(&self, snapshot: &ElementSnapshot) -> bool {
        match self {
            Strategy::Label { labels, .. } => {
                let haystack = searchable(snapshot);
                labels
                    .iter()
                    .any(|label| haystack.contains(&label.to_lowercase()))
            }
            _ => true,
        }
    }
}

fn searchable(snapshot: &ElementSnapshot) -> String {
    format!("{} {}", snapshot.text, snapshot.label).to_lowercase()
}

/// Ordered, immutable strategy list for one logical element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    pub name: String,
    pub strategies: Vec<Strategy>,
}

impl TargetDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            strategies: Vec::new(),
        }
    }

    pub fn attribute(mut self, css: &str) -> Self {
        self.strategies.push(Strategy::Attribute {
            css: css.to_string(),
        });
        self
    }

    pub fn label(mut self, scope: &str, labels: &[&str]) -> Self {
        self.strategies.push(Strategy::Label {
            scope: scope.to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        });
        self
    }

    pub fn structural(mut self, xpath: &str) -> Self {
        self.strategies.push(Strategy::Structural {
            xpath: xpath.to_string(),
        });
        self
    }
}

/// Which rendered states are acceptable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Present in the DOM
    Any,
    /// Rendered with a non-zero box
    #[default]
    Visible,
    /// Visible and not disabled
    Interactable,
}

impl Visibility {
    fn admits(self, snapshot: &ElementSnapshot) -> bool {
        match self {
            Visibility::Any => true,
            Visibility::Visible => snapshot.visible,
            Visibility::Interactable => snapshot.visible && snapshot.enabled,
        }
    }
}

/// Case-insensitive text/label predicate applied on top of every strategy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextFilter {
    /// At least one must appear (ignored when empty)
    pub any_of: Vec<String>,
    /// None may appear
    pub none_of: Vec<String>,
}

impl TextFilter {
    pub fn containing(needles: &[&str]) -> Self {
        Self {
            any_of: needles.iter().map(|n| n.to_lowercase()).collect(),
            none_of: Vec::new(),
        }
    }

    pub fn excluding(mut self, needles: &[&str]) -> Self {
        self.none_of
            .extend(needles.iter().map(|n| n.to_lowercase()));
        self
    }

    pub fn matches(&self, snapshot: &ElementSnapshot) -> bool {
        let haystack = searchable(snapshot);
        let wanted = self.any_of.is_empty()
            || self
                .any_of
                .iter()
                .any(|n| haystack.contains(&n.to_lowercase()));
        wanted
            && !self
                .none_of
                .iter()
                .any(|n| haystack.contains(&n.to_lowercase()))
    }
}

/// Transient handle to a located element.
///
/// Valid only until the next navigation or DOM mutation; never keep one
/// across steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedElement {
    /// Descriptor name
    pub target: String,
    pub element: ElementRef,
    /// Position of the winning strategy in the descriptor
    pub strategy_index: usize,
    pub strategy_kind: &'static str,
    pub text: String,
    pub label: String,
}

/// Read-only resolver over one page
pub struct Locator<'p, P: PageDriver + ?Sized> {
    page: &'p P,
}

impl<'p, P: PageDriver + ?Sized> Locator<'p, P> {
    pub fn new(page: &'p P) -> Self {
        Self { page }
    }

    /// Single pass over the strategies; `None` when nothing is admissible.
    ///
    /// A strategy whose query errors (bad selector, detached frame) counts as
    /// a miss for that strategy only.
    pub async fn locate(
        &self,
        descriptor: &TargetDescriptor,
        visibility: Visibility,
        filter: Option<&TextFilter>,
    ) -> Option<ResolvedElement> {
        for (strategy_index, strategy) in descriptor.strategies.iter().enumerate() {
            let query = strategy.query();
            let snapshots = match self.page.inspect(&query).await {
                Ok(snapshots) => snapshots,
                Err(e) => {
                    debug!(
                        "{}: strategy {} ({}) query failed: {}",
                        descriptor.name,
                        strategy_index,
                        strategy.kind(),
                        e
                    );
                    continue;
                }
            };

            let hit = snapshots.into_iter().find(|snap| {
                visibility.admits(snap)
                    && strategy.admits(snap)
                    && filter.map_or(true, |f| f.matches(snap))
            });

            match hit {
                Some(snap) => {
                    debug!(
                        "{}: resolved by strategy {} ({}) at {} #{}",
                        descriptor.name,
                        strategy_index,
                        strategy.kind(),
                        query,
                        snap.index
                    );
                    return Some(ResolvedElement {
                        target: descriptor.name.clone(),
                        element: ElementRef {
                            query,
                            index: snap.index,
                        },
                        strategy_index,
                        strategy_kind: strategy.kind(),
                        text: snap.text,
                        label: snap.label,
                    });
                }
                None => trace!(
                    "{}: strategy {} ({}) had no admissible match",
                    descriptor.name,
                    strategy_index,
                    strategy.kind()
                ),
            }
        }
        None
    }

    /// Repeat [`locate`](Self::locate) over the full strategy list until a
    /// match or the deadline. Never errors.
    pub async fn locate_with_poll(
        &self,
        descriptor: &TargetDescriptor,
        visibility: Visibility,
        filter: Option<&TextFilter>,
        poll: PollConfig,
    ) -> Option<ResolvedElement> {
        let found = poll_until(&descriptor.name, poll, |_| async move {
            Ok(self.locate(descriptor, visibility, filter).await)
        })
        .await;

        match found {
            Ok(found) => found,
            Err(e) => {
                debug!("{}: poll aborted: {}", descriptor.name, e);
                None
            }
        }
    }

    /// [`locate_with_poll`](Self::locate_with_poll), with a miss mapped to
    /// [`QuillError::NotFound`] for callers where the element is required
    pub async fn require(
        &self,
        descriptor: &TargetDescriptor,
        visibility: Visibility,
        filter: Option<&TextFilter>,
        poll: PollConfig,
    ) -> Result<ResolvedElement> {
        self.locate_with_poll(descriptor, visibility, filter, poll)
            .await
            .ok_or_else(|| QuillError::not_found(descriptor.name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockElement, MockPage};

    fn submit_control() -> TargetDescriptor {
        TargetDescriptor::new("submit control")
            .attribute("button[type='submit']")
            .label("button", &["sign in", "log in"])
            .structural("//form//button")
    }

    #[tokio::test]
    async fn test_first_matching_strategy_wins() {
        let page = MockPage::new()
            .with_element(MockElement::css("button[type='submit']").with_text("Continue"))
            .with_element(MockElement::css("button").with_text("Sign in"))
            .with_element(MockElement::xpath("//form//button"));

        let found = Locator::new(&page)
            .locate(&submit_control(), Visibility::Visible, None)
            .await
            .unwrap();

        assert_eq!(found.strategy_index, 0);
        assert_eq!(found.strategy_kind, "attribute");
        assert_eq!(found.text, "Continue");
        // later strategies are never queried
        assert_eq!(page.inspections(&ElementQuery::css("button")), 0);
    }

    #[tokio::test]
    async fn test_failing_query_is_a_miss_for_that_strategy() {
        let page = MockPage::new()
            .with_element(MockElement::css("button[type='submit']").with_text("Continue"))
            .with_element(MockElement::css("button").with_text("Sign in"))
            .failing_query(ElementQuery::css("button[type='submit']"));

        let found = Locator::new(&page)
            .locate(&submit_control(), Visibility::Visible, None)
            .await
            .unwrap();

        assert_eq!(found.strategy_index, 1);
        assert_eq!(found.strategy_kind, "label");
        assert_eq!(page.inspections(&ElementQuery::css("button[type='submit']")), 1);
    }

    #[tokio::test]
    async fn test_hidden_matches_fall_through() {
        let page = MockPage::new()
            .with_element(MockElement::css("button[type='submit']").hidden())
            .with_element(MockElement::css("button").with_text("Help"))
            .with_element(MockElement::css("button").with_label("Sign in"));

        let found = Locator::new(&page)
            .locate(&submit_control(), Visibility::Visible, None)
            .await
            .unwrap();

        assert_eq!(found.strategy_index, 1);
        assert_eq!(found.element.index, 1);
        assert_eq!(found.element.query, ElementQuery::css("button"));
    }

    #[tokio::test]
    async fn test_text_filter_is_case_insensitive_with_exclusions() {
        let page = MockPage::new()
            .with_element(MockElement::css("button").with_text("Repost"))
            .with_element(MockElement::css("button").with_text("POST"));
        let descriptor = TargetDescriptor::new("publish").attribute("button");
        let filter = TextFilter::containing(&["post"]).excluding(&["repost"]);

        let found = Locator::new(&page)
            .locate(&descriptor, Visibility::Visible, Some(&filter))
            .await
            .unwrap();
        assert_eq!(found.element.index, 1);
    }

    #[tokio::test]
    async fn test_interactable_skips_disabled() {
        let page = MockPage::new()
            .with_element(MockElement::css("button").with_text("Post").disabled());
        let descriptor = TargetDescriptor::new("publish").attribute("button");
        let locator = Locator::new(&page);

        assert!(locator
            .locate(&descriptor, Visibility::Interactable, None)
            .await
            .is_none());
        assert!(locator
            .locate(&descriptor, Visibility::Visible, None)
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_no_match_returns_none_without_error() {
        let page = MockPage::new();
        let found = Locator::new(&page)
            .locate_with_poll(
                &submit_control(),
                Visibility::Visible,
                None,
                PollConfig::from_millis(1, 10),
            )
            .await;
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_poll_waits_for_late_element() {
        let page = MockPage::new().with_element(MockElement::xpath("//form//button").appears_after(2));

        let found = Locator::new(&page)
            .locate_with_poll(
                &submit_control(),
                Visibility::Visible,
                None,
                PollConfig::from_millis(1, 1_000),
            )
            .await
            .unwrap();

        assert_eq!(found.strategy_index, 2);
        assert_eq!(page.inspections(&ElementQuery::xpath("//form//button")), 3);
    }

    #[tokio::test]
    async fn test_require_maps_miss_to_not_found() {
        let page = MockPage::new();
        let result = Locator::new(&page)
            .require(&submit_control(), Visibility::Visible, None, PollConfig::once())
            .await;
        assert!(matches!(result, Err(QuillError::NotFound { target }) if target == "submit control"));
    }
}
