//! Logical targets of the publishing surface
//!
//! Every element the workflow touches is described by intent with an ordered
//! list of strategies. Stable attributes come first, visible wording next and
//! document structure last.

use quill_browser::{TargetDescriptor, TextFilter};

/// Descriptors and text predicates for one site
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub username_field: TargetDescriptor,
    pub password_field: TargetDescriptor,
    pub login_submit: TargetDescriptor,
    /// Link back to the target surface when direct navigation fails
    pub home_link: TargetDescriptor,
    pub composer_trigger: TargetDescriptor,
    pub composer_trigger_filter: TextFilter,
    /// Any share-box container, tried once after the search rounds run out
    pub composer_entry: TargetDescriptor,
    pub editor: TargetDescriptor,
    /// Text inputs whose placeholder or label reads like a post prompt
    pub editor_by_label: TargetDescriptor,
    pub publish_button: TargetDescriptor,
    pub publish_filter: TextFilter,
    pub success_indicator: TargetDescriptor,
    pub success_filter: TextFilter,
}

impl SiteProfile {
    pub fn linkedin() -> Self {
        Self {
            username_field: TargetDescriptor::new("username field")
                .attribute("#username")
                .attribute(r#"input[name="session_key"]"#)
                .attribute(r#"input[autocomplete="username"]"#),
            password_field: TargetDescriptor::new("password field")
                .attribute("#password")
                .attribute(r#"input[name="session_password"]"#)
                .attribute(r#"input[type="password"]"#),
            login_submit: TargetDescriptor::new("sign-in button")
                .attribute(r#"[type="submit"]"#)
                .attribute("button[data-litms-control-urn]")
                .attribute(".btn__primary--large")
                .label("button", &["sign in"]),
            home_link: TargetDescriptor::new("home link")
                .attribute(r#"a[href*="/feed"]"#)
                .attribute(r#"a[href="/"]"#)
                .attribute(".global-nav__primary-link"),
            composer_trigger: TargetDescriptor::new("composer trigger")
                .attribute(r#"button[aria-label*="Start a post"]"#)
                .attribute(r#"button[data-test-id="share-box-trigger"]"#)
                .attribute(".share-box-feed-entry__trigger")
                .attribute(r#"[data-control-name="share_to_feed"]"#)
                .label("button", &["start a post"])
                .attribute(".artdeco-button--secondary")
                .attribute(".share-box-feed-entry__closed-share-box")
                .attribute(r#"button[data-test-id*="share"]"#),
            composer_trigger_filter: TextFilter::containing(&["start", "post", "share"]),
            composer_entry: TargetDescriptor::new("composer entry")
                .attribute("div.share-box-feed-entry")
                .attribute(".share-box-feed-entry__closed-share-box")
                .attribute(r#"[data-test-id*="share-box"]"#),
            editor: TargetDescriptor::new("post editor")
                .attribute(r#"div[role="textbox"][contenteditable="true"]"#)
                .attribute(r#"div[contenteditable="true"]"#)
                .attribute(".ql-editor")
                .attribute(".editor-content")
                .attribute(r#"[data-placeholder*="post"]"#)
                .attribute(".share-creation-state__text-editor")
                .attribute(r#"div[data-test-id="share-box-text-editor"]"#),
            editor_by_label: TargetDescriptor::new("post editor (by label)").label(
                r#"textarea, input[type="text"], div[contenteditable="true"]"#,
                &["post", "share", "what"],
            ),
            publish_button: TargetDescriptor::new("publish button")
                .attribute("button[data-test-id='share-actions-primary-button']")
                .attribute("button[aria-label*='Post']")
                .label("button", &["post"])
                .attribute(".share-actions__primary-action")
                .attribute("button[data-control-name='share.post']")
                .structural("//button[contains(text(), 'Post') and not(contains(text(), 'Repost'))]"),
            publish_filter: TextFilter::containing(&["post"]).excluding(&["repost"]),
            success_indicator: TargetDescriptor::new("confirmation toast")
                .attribute(".Toasts")
                .attribute(r#"[data-test-id="toast"]"#)
                .attribute(".artdeco-toast"),
            success_filter: TextFilter::containing(&["post"]),
        }
    }
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self::linkedin()
    }
}
