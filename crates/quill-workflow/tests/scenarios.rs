//! End-to-end runs of the publication workflow against a scripted page

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use quill_browser::mock::{MockElement, MockLauncher, MockPage};
use quill_browser::{DiagnosticsResult, ElementQuery, PageDriver};
use quill_core::config::TimingConfig;
use quill_core::{Credentials, QuillConfig, QuillError, Result};
use quill_workflow::{
    publish, publish_with, Outcome, PublishReport, RecordingSink, Stage, StepAction, StepEvent,
    StepReport, Workflow, WorkflowContext,
};
use tempfile::TempDir;

const LOGIN: &str = "https://www.linkedin.com/login";
const FEED: &str = "https://www.linkedin.com/feed/";
const CHALLENGE: &str = "https://www.linkedin.com/checkpoint/challenge/AgE";

const SIGN_IN: &str = r#"[type="submit"]"#;
const START_POST: &str = r#"button[aria-label*="Start a post"]"#;
const SHARE_TRIGGER: &str = ".share-box-feed-entry__trigger";
const EDITOR: &str = r#"div[role="textbox"][contenteditable="true"]"#;
const PUBLISH: &str = "button[data-test-id='share-actions-primary-button']";
const TOAST: &str = ".Toasts";

const CONTENT: &str = "Shipped the new release today.\nThanks to everyone who helped!";

fn login_form(sign_in_lands_on: &str) -> MockPage {
    MockPage::new()
        .with_element(MockElement::css("#username").only_on("/login"))
        .with_element(MockElement::css("#password").only_on("/login"))
        .with_element(
            MockElement::css(SIGN_IN)
                .with_text("Sign in")
                .only_on("/login")
                .navigates_to(sign_in_lands_on),
        )
}

fn feed_page(page: MockPage, editor_residual: &str) -> MockPage {
    page.with_element(MockElement::css(EDITOR).with_value(editor_residual).only_on("/feed"))
        .with_element(MockElement::css(PUBLISH).with_text("Post").only_on("/feed"))
        .with_element(MockElement::css(TOAST).with_text("Post successful. View post").only_on("/feed"))
}

fn linkedin(editor_residual: &str) -> MockPage {
    feed_page(login_form(FEED), editor_residual)
        .with_element(MockElement::css(START_POST).with_text("Start a post").only_on("/feed"))
}

fn config(diagnostics_dir: &Path) -> QuillConfig {
    let mut config = QuillConfig::default();
    config.timings = TimingConfig::immediate();
    config.diagnostics.dir = diagnostics_dir.to_path_buf();
    config
}

fn credentials() -> Credentials {
    Credentials::new("me@example.com", "correct horse battery staple")
}

async fn run(page: MockPage, dir: &Path) -> (PublishReport, MockPage, Arc<RecordingSink>) {
    let launcher = MockLauncher::new(page);
    let sink = Arc::new(RecordingSink::new());
    let report = publish(&launcher, &config(dir), CONTENT, &credentials(), sink.clone()).await;
    (report, launcher.page().clone(), sink)
}

#[tokio::test]
async fn scenario_first_choice_strategies_succeed() {
    let temp = TempDir::new().unwrap();
    let (report, page, sink) = run(linkedin(""), temp.path()).await;

    assert!(report.outcome.is_success(), "{:?}", report.outcome);
    assert!(report.diagnostics.is_none());
    assert_eq!(page.screenshot_calls(), 0);
    assert_eq!(page.close_calls(), 1);
    assert_eq!(page.prepare_calls(), 1);
    assert_eq!(page.value_of(&ElementQuery::css(EDITOR)).as_deref(), Some(CONTENT));
    assert_eq!(page.navigations(), vec![LOGIN.to_string(), FEED.to_string()]);

    assert!(!report.resolutions.is_empty());
    assert!(report.resolutions.iter().all(|r| r.strategy_index == 0));
    assert!(report.notes.iter().any(|n| n == "confirmation indicator detected"));

    assert_eq!(sink.started_stages(), Stage::ALL.to_vec());
    assert_eq!(report.events, sink.events());
}

#[tokio::test]
async fn scenario_challenge_after_sign_in_is_authentication_incomplete() {
    let temp = TempDir::new().unwrap();
    let page = feed_page(login_form(CHALLENGE), "");
    let (report, page, sink) = run(page, temp.path()).await;

    match &report.outcome {
        Outcome::Failed {
            stage: Stage::ConfirmAuthenticated,
            reason: QuillError::AuthenticationIncomplete(message),
        } => assert!(message.contains("/checkpoint/challenge")),
        other => panic!("unexpected outcome: {:?}", other),
    }

    assert_eq!(page.screenshot_calls(), 1);
    assert_eq!(page.close_calls(), 1);
    match &report.diagnostics {
        Some(DiagnosticsResult::Captured(path)) => {
            assert!(path.starts_with(temp.path()));
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            assert!(name.starts_with("linkedin-error-ConfirmAuthenticated-"));
            assert!(path.exists());
        }
        other => panic!("expected a captured snapshot, got {:?}", other),
    }

    // not retried: the same credentials would meet the same challenge
    let confirm_attempts = sink
        .events()
        .iter()
        .filter(|e| {
            matches!(
                e,
                StepEvent::AttemptStarted {
                    stage: Stage::ConfirmAuthenticated,
                    ..
                }
            )
        })
        .count();
    assert_eq!(confirm_attempts, 1);
    assert_eq!(sink.started_stages(), Stage::ALL[..4].to_vec());
}

#[tokio::test]
async fn scenario_composer_found_by_late_fallback_strategy() {
    let temp = TempDir::new().unwrap();
    let page = feed_page(login_form(FEED), "").with_element(
        MockElement::css(SHARE_TRIGGER)
            .with_text("Start a post")
            .only_on("/feed")
            .appears_after(2),
    );
    let (report, page, _) = run(page, temp.path()).await;

    assert!(report.outcome.is_success(), "{:?}", report.outcome);
    assert_eq!(page.screenshot_calls(), 0);

    let trigger = report.resolution("composer trigger").unwrap();
    assert_eq!(trigger.strategy_index, 2);
    assert_eq!(trigger.strategy_kind, "attribute");
    assert_eq!(page.inspections(&ElementQuery::css(SHARE_TRIGGER)), 3);
    assert_eq!(page.inspections(&ElementQuery::css(START_POST)), 3);
}

/// Fails every attempt
struct Injected;

#[async_trait]
impl<P: PageDriver> StepAction<P> for Injected {
    async fn run(&self, _ctx: &WorkflowContext<'_, P>) -> Result<StepReport> {
        Err(QuillError::Other("injected failure".to_string()))
    }
}

#[tokio::test]
async fn failure_at_any_stage_halts_the_run_there() {
    for (index, stage) in Stage::ALL.iter().copied().enumerate() {
        let temp = TempDir::new().unwrap();
        let config = config(temp.path());
        let launcher = MockLauncher::new(linkedin("draft"));
        let sink = Arc::new(RecordingSink::new());
        let workflow = Workflow::standard(&config.timings).with_action(stage, Injected);

        let report = publish_with(&launcher, &config, workflow, CONTENT, &credentials(), sink.clone()).await;

        assert_eq!(report.outcome.failed_stage(), Some(stage), "injected at {}", stage);
        match &report.outcome {
            Outcome::Failed { reason, .. } => assert_eq!(reason.root().to_string(), "injected failure"),
            Outcome::Succeeded => unreachable!(),
        }
        assert_eq!(sink.started_stages(), Stage::ALL[..=index].to_vec());
        assert_eq!(launcher.page().close_calls(), 1);
        assert_eq!(launcher.page().screenshot_calls(), 1);
    }
}

#[tokio::test]
async fn injected_content_replaces_any_residual_text() {
    for residual in ["", "Start writing your post...", "an older draft\nwith two lines"] {
        let temp = TempDir::new().unwrap();
        let (report, page, _) = run(linkedin(residual), temp.path()).await;

        assert!(report.outcome.is_success(), "residual {:?}: {:?}", residual, report.outcome);
        assert_eq!(page.value_of(&ElementQuery::css(EDITOR)).as_deref(), Some(CONTENT));
    }
}

#[tokio::test]
async fn launch_failure_is_reported_at_launch() {
    let temp = TempDir::new().unwrap();
    let launcher = MockLauncher::failing();
    let sink = Arc::new(RecordingSink::new());

    let report = publish(&launcher, &config(temp.path()), CONTENT, &credentials(), sink.clone()).await;

    assert_eq!(report.outcome.failed_stage(), Some(Stage::Launch));
    assert!(report.diagnostics.is_none());
    assert_eq!(launcher.page().close_calls(), 0);
    assert!(matches!(
        sink.events().last(),
        Some(StepEvent::StepFailed {
            stage: Stage::Launch,
            ..
        })
    ));
}

#[tokio::test]
async fn screenshot_failure_does_not_change_the_outcome() {
    let temp = TempDir::new().unwrap();
    let page = login_form(CHALLENGE).failing_screenshots();
    let (report, page, _) = run(page, temp.path()).await;

    assert_eq!(report.outcome.failed_stage(), Some(Stage::ConfirmAuthenticated));
    assert!(matches!(report.diagnostics, Some(DiagnosticsResult::CaptureFailed(_))));
    assert_eq!(page.close_calls(), 1);
}

#[tokio::test]
async fn disabled_diagnostics_skip_the_snapshot() {
    let temp = TempDir::new().unwrap();
    let mut config = config(temp.path());
    config.diagnostics.enabled = false;
    let launcher = MockLauncher::new(login_form(CHALLENGE));

    let report = publish(
        &launcher,
        &config,
        CONTENT,
        &credentials(),
        Arc::new(RecordingSink::new()),
    )
    .await;

    assert!(!report.outcome.is_success());
    assert!(report.diagnostics.is_none());
    assert_eq!(launcher.page().screenshot_calls(), 0);
}

#[tokio::test]
async fn missing_confirmation_still_counts_as_success() {
    let temp = TempDir::new().unwrap();
    let page = login_form(FEED)
        .with_element(MockElement::css(START_POST).with_text("Start a post").only_on("/feed"))
        .with_element(MockElement::css(EDITOR).only_on("/feed"))
        .with_element(MockElement::css(PUBLISH).with_text("Post").only_on("/feed"));
    let (report, _, _) = run(page, temp.path()).await;

    assert!(report.outcome.is_success());
    assert!(report
        .notes
        .iter()
        .any(|n| n == "no confirmation indicator observed"));
    assert_eq!(report.summary().status, "succeeded");
}
