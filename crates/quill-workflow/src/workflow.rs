//! Workflow runner and the `publish` entry point
//!
//! The runner feeds step results into the pure state machine and performs
//! the actions it asks for. The Workflow Context is only mutated between
//! steps: a step gets a shared borrow and hands back a [`StepReport`].

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use quill_browser::{
    with_session, DiagnosticsReporter, DiagnosticsResult, Locator, PageDriver, SessionLauncher,
};
use quill_core::config::{SiteConfig, TimingConfig};
use quill_core::{Credentials, PollConfig, QuillConfig, QuillError};
use serde::Serialize;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::events::{Broadcast, EventSink, RecordingSink, StepEvent};
use crate::stage::Stage;
use crate::state_machine::{transition, Action, Event, State};
use crate::step::{Resolution, Step, StepAction, StepExecutor, StepReport};
use crate::steps;
use crate::targets::SiteProfile;

/// State threaded through the steps of one run
pub struct WorkflowContext<'a, P: PageDriver> {
    pub page: &'a P,
    /// Opaque payload, injected verbatim
    pub content: &'a str,
    pub credentials: &'a Credentials,
    pub site: &'a SiteConfig,
    pub profile: &'a SiteProfile,
    pub timings: &'a TimingConfig,
    notes: Vec<String>,
    resolutions: Vec<Resolution>,
}

impl<'a, P: PageDriver> WorkflowContext<'a, P> {
    pub fn new(
        page: &'a P,
        content: &'a str,
        credentials: &'a Credentials,
        site: &'a SiteConfig,
        profile: &'a SiteProfile,
        timings: &'a TimingConfig,
    ) -> Self {
        Self {
            page,
            content,
            credentials,
            site,
            profile,
            timings,
            notes: Vec::new(),
            resolutions: Vec::new(),
        }
    }

    pub fn locator(&self) -> Locator<'a, P> {
        Locator::new(self.page)
    }

    /// Poll window with the configured interval
    pub fn poll(&self, timeout_ms: u64) -> PollConfig {
        self.timings.poll(timeout_ms)
    }

    /// Fixed pause after a UI action
    pub async fn settle(&self, ms: u64) {
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn resolutions(&self) -> &[Resolution] {
        &self.resolutions
    }

    fn absorb(&mut self, report: StepReport) {
        self.notes.extend(report.notes);
        self.resolutions.extend(report.resolutions);
    }
}

/// Terminal result of one run
#[derive(Debug)]
pub enum Outcome {
    Succeeded,
    Failed { stage: Stage, reason: QuillError },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded)
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Outcome::Succeeded => None,
            Outcome::Failed { stage, .. } => Some(*stage),
        }
    }
}

/// Everything a caller learns about one run
#[derive(Debug)]
pub struct PublishReport {
    pub run_id: Uuid,
    pub outcome: Outcome,
    pub notes: Vec<String>,
    pub resolutions: Vec<Resolution>,
    pub events: Vec<StepEvent>,
    /// Set only when a failure snapshot was attempted
    pub diagnostics: Option<DiagnosticsResult>,
}

impl PublishReport {
    /// How `target` was last resolved, if it was
    pub fn resolution(&self, target: &str) -> Option<&Resolution> {
        self.resolutions.iter().rev().find(|r| r.target == target)
    }

    /// Serializable digest for logs and the CLI
    pub fn summary(&self) -> ReportSummary {
        let (status, stage, kind, reason) = match &self.outcome {
            Outcome::Succeeded => ("succeeded", None, None, None),
            Outcome::Failed { stage, reason } => (
                "failed",
                Some(*stage),
                Some(reason.root().kind()),
                Some(reason.to_string()),
            ),
        };
        ReportSummary {
            run_id: self.run_id.to_string(),
            status,
            stage,
            kind,
            reason,
            notes: self.notes.clone(),
            resolutions: self.resolutions.clone(),
            diagnostics: self.diagnostics.as_ref().map(|d| d.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub run_id: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub notes: Vec<String>,
    pub resolutions: Vec<Resolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

/// The ordered step list plus the site profile its actions resolve against
pub struct Workflow<P: PageDriver> {
    steps: Vec<Step<P>>,
    profile: SiteProfile,
}

impl<P: PageDriver + 'static> Workflow<P> {
    /// The nine publication steps with budgets from `timings`
    pub fn standard(timings: &TimingConfig) -> Self {
        let budgets = &timings.steps;
        Self {
            steps: vec![
                Step::new(Stage::Launch, budgets.launch, steps::PreparePage),
                Step::new(
                    Stage::NavigateToAuthSurface,
                    budgets.navigate_to_auth_surface,
                    steps::LoadAuthSurface,
                ),
                Step::new(
                    Stage::SubmitCredentials,
                    budgets.submit_credentials,
                    steps::EnterCredentials,
                ),
                Step::new(
                    Stage::ConfirmAuthenticated,
                    budgets.confirm_authenticated,
                    steps::AwaitAuthentication,
                ),
                Step::new(
                    Stage::NavigateToTargetSurface,
                    budgets.navigate_to_target_surface,
                    steps::LoadTargetSurface,
                ),
                Step::new(Stage::OpenComposer, budgets.open_composer, steps::OpenComposer),
                Step::new(Stage::InjectContent, budgets.inject_content, steps::InjectContent),
                Step::new(Stage::SubmitContent, budgets.submit_content, steps::SubmitContent),
                Step::new(
                    Stage::VerifySubmission,
                    budgets.verify_submission,
                    steps::VerifySubmission,
                ),
            ],
            profile: SiteProfile::default(),
        }
    }
}

impl<P: PageDriver> Workflow<P> {
    /// Replace the action of one stage, keeping its budget
    pub fn with_action(mut self, stage: Stage, action: impl StepAction<P> + 'static) -> Self {
        if let Some(step) = self.steps.iter_mut().find(|s| s.stage == stage) {
            step.action = Box::new(action);
        }
        self
    }

    pub fn with_budget(mut self, stage: Stage, budget: quill_core::config::StepBudget) -> Self {
        if let Some(step) = self.steps.iter_mut().find(|s| s.stage == stage) {
            step.budget = budget;
        }
        self
    }

    pub fn with_profile(mut self, profile: SiteProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    pub fn steps(&self) -> &[Step<P>] {
        &self.steps
    }

    /// Drive every stage through the state machine.
    ///
    /// Stops at the first failed step; no later step runs. When a reporter
    /// is given, the failure snapshot is taken before returning.
    pub async fn run(
        &self,
        ctx: &mut WorkflowContext<'_, P>,
        executor: &StepExecutor,
        diagnostics: Option<&DiagnosticsReporter>,
    ) -> (Outcome, Option<DiagnosticsResult>) {
        let (mut state, mut actions) = transition(State::Ready, Event::Start);
        let mut failure: Option<QuillError> = None;
        let mut snapshot = None;

        loop {
            let mut next_event = None;
            for action in actions {
                match action {
                    Action::LogActivity { message } => info!("{}", message),
                    Action::RunStep { stage } => {
                        let result = match self.steps.iter().find(|s| s.stage == stage) {
                            Some(step) => executor.run(step, ctx).await.result,
                            None => Err(QuillError::Config(format!("No step registered for {}", stage))),
                        };
                        next_event = Some(match result {
                            Ok(report) => {
                                ctx.absorb(report);
                                Event::StageSucceeded
                            }
                            Err(e) => {
                                let reason = e.to_string();
                                failure = Some(e);
                                Event::StageFailed { reason }
                            }
                        });
                    }
                    Action::CaptureDiagnostics { stage } => {
                        if let Some(reporter) = diagnostics {
                            snapshot = Some(reporter.capture_on_failure(ctx.page, stage.name()).await);
                        }
                    }
                }
            }

            match next_event {
                Some(event) => (state, actions) = transition(state, event),
                None => break,
            }
        }

        let outcome = match state {
            State::Succeeded => Outcome::Succeeded,
            State::Failed { stage, reason } => Outcome::Failed {
                stage,
                reason: failure.unwrap_or(QuillError::Other(reason)),
            },
            other => Outcome::Failed {
                stage: Stage::first(),
                reason: QuillError::Other(format!("Workflow stopped in {:?}", other)),
            },
        };
        (outcome, snapshot)
    }
}

struct RunSummary {
    outcome: Outcome,
    diagnostics: Option<DiagnosticsResult>,
    notes: Vec<String>,
    resolutions: Vec<Resolution>,
}

/// Publish `content` with the standard workflow
pub async fn publish<L>(
    launcher: &L,
    config: &QuillConfig,
    content: &str,
    credentials: &Credentials,
    sink: Arc<dyn EventSink>,
) -> PublishReport
where
    L: SessionLauncher,
{
    let workflow = Workflow::standard(&config.timings);
    publish_with(launcher, config, workflow, content, credentials, sink).await
}

/// Publish `content` with a caller-assembled workflow.
///
/// Opens one session, runs every step in order and closes the session on
/// every path. A launch failure is reported as a failed `Launch` stage.
pub async fn publish_with<L>(
    launcher: &L,
    config: &QuillConfig,
    workflow: Workflow<L::Page>,
    content: &str,
    credentials: &Credentials,
    sink: Arc<dyn EventSink>,
) -> PublishReport
where
    L: SessionLauncher,
{
    let run_id = Uuid::new_v4();
    let span = info_span!("publish", run_id = %run_id);

    async move {
        info!("Publishing {} characters", content.chars().count());

        let recorder = Arc::new(RecordingSink::new());
        let broadcast: Arc<dyn EventSink> =
            Arc::new(Broadcast::new().with(sink).with(recorder.clone()));
        let executor = StepExecutor::new(broadcast.clone());
        let reporter =
            DiagnosticsReporter::from_config(&config.diagnostics, &config.site.artifact_prefix);

        let content = content.to_string();
        let credentials = credentials.clone();
        let site = config.site.clone();
        let timings = config.timings.clone();

        let session_result = with_session(launcher, &config.session, move |session| {
            async move {
                let mut ctx = WorkflowContext::new(
                    session.page(),
                    &content,
                    &credentials,
                    &site,
                    workflow.profile(),
                    &timings,
                );
                let (outcome, diagnostics) =
                    workflow.run(&mut ctx, &executor, reporter.as_ref()).await;
                Ok(RunSummary {
                    outcome,
                    diagnostics,
                    notes: ctx.notes,
                    resolutions: ctx.resolutions,
                })
            }
            .boxed()
        })
        .await;

        let summary = session_result.unwrap_or_else(|e| {
            broadcast.emit(&StepEvent::StepFailed {
                stage: Stage::Launch,
                attempts: 1,
                elapsed_ms: 0,
                kind: e.root().kind().to_string(),
                reason: e.to_string(),
            });
            RunSummary {
                outcome: Outcome::Failed {
                    stage: Stage::Launch,
                    reason: e,
                },
                diagnostics: None,
                notes: Vec::new(),
                resolutions: Vec::new(),
            }
        });

        match &summary.outcome {
            Outcome::Succeeded => info!("Publication succeeded"),
            Outcome::Failed { stage, reason } => error!("Publication failed at {}: {}", stage, reason),
        }

        PublishReport {
            run_id,
            outcome: summary.outcome,
            notes: summary.notes,
            resolutions: summary.resolutions,
            events: recorder.events(),
            diagnostics: summary.diagnostics,
        }
    }
    .instrument(span)
    .await
}
