//! Steps and the Step Executor
//!
//! A [`Step`] pairs a stage with its budget and its action. The executor runs
//! the action under the budget's Retry/Backoff Policy and wraps the whole
//! attempt loop in the step timeout, so a slow attempt is abandoned mid-way
//! once the step's time is up.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quill_browser::{PageDriver, ResolvedElement};
use quill_core::config::StepBudget;
use quill_core::{QuillError, Result};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::events::{EventSink, StepEvent};
use crate::stage::Stage;
use crate::workflow::WorkflowContext;

/// Which strategy resolved a logical target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub target: String,
    pub strategy_index: usize,
    pub strategy_kind: String,
}

impl From<&ResolvedElement> for Resolution {
    fn from(element: &ResolvedElement) -> Self {
        Self {
            target: element.target.clone(),
            strategy_index: element.strategy_index,
            strategy_kind: element.strategy_kind.to_string(),
        }
    }
}

/// What a successful step hands back for the workflow context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    pub notes: Vec<String>,
    pub resolutions: Vec<Resolution>,
}

impl StepReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn resolved(&mut self, element: &ResolvedElement) {
        self.resolutions.push(Resolution::from(element));
    }
}

/// The work of one stage. Runs once per attempt.
#[async_trait]
pub trait StepAction<P: PageDriver>: Send + Sync {
    async fn run(&self, ctx: &WorkflowContext<'_, P>) -> Result<StepReport>;
}

/// A named, budgeted unit of the workflow
pub struct Step<P: PageDriver> {
    pub stage: Stage,
    pub budget: StepBudget,
    pub action: Box<dyn StepAction<P>>,
}

impl<P: PageDriver> Step<P> {
    pub fn new(stage: Stage, budget: StepBudget, action: impl StepAction<P> + 'static) -> Self {
        Self {
            stage,
            budget,
            action: Box::new(action),
        }
    }

    pub fn name(&self) -> &'static str {
        self.stage.name()
    }
}

/// Result of running one step to completion
#[derive(Debug)]
pub struct StepOutcome {
    pub stage: Stage,
    pub attempts: u32,
    pub elapsed: Duration,
    pub result: Result<StepReport>,
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs steps under their budgets and reports progress to a sink
#[derive(Clone)]
pub struct StepExecutor {
    sink: Arc<dyn EventSink>,
}

impl StepExecutor {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    pub async fn run<P: PageDriver>(&self, step: &Step<P>, ctx: &WorkflowContext<'_, P>) -> StepOutcome {
        let started = Instant::now();
        let policy = step.budget.retry_policy();
        let max_attempts = policy.max_attempts.max(1);
        let mut attempts = 0u32;

        let attempt_loop = policy.execute(step.name(), |attempt| {
            attempts = attempt;
            self.sink.emit(&StepEvent::AttemptStarted {
                stage: step.stage,
                attempt,
                max_attempts,
            });
            step.action.run(ctx)
        });

        let result = match tokio::time::timeout(step.budget.timeout(), attempt_loop).await {
            Ok(result) => result,
            Err(_) => Err(QuillError::Timeout {
                operation: step.name().to_string(),
                elapsed: started.elapsed(),
            }),
        };

        let elapsed = started.elapsed();
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        match &result {
            Ok(_) => self.sink.emit(&StepEvent::StepSucceeded {
                stage: step.stage,
                attempts,
                elapsed_ms,
            }),
            Err(e) => self.sink.emit(&StepEvent::StepFailed {
                stage: step.stage,
                attempts,
                elapsed_ms,
                kind: e.root().kind().to_string(),
                reason: e.to_string(),
            }),
        }

        StepOutcome {
            stage: step.stage,
            attempts,
            elapsed,
            result,
        }
    }
}
