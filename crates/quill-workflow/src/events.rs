//! Step progress events
//!
//! Events are an observation channel only: nothing in the workflow reads
//! them back to decide what to do next.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::stage::Stage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StepEvent {
    /// Emitted before every attempt of a step
    AttemptStarted {
        stage: Stage,
        attempt: u32,
        max_attempts: u32,
    },
    StepSucceeded {
        stage: Stage,
        attempts: u32,
        elapsed_ms: u64,
    },
    StepFailed {
        stage: Stage,
        attempts: u32,
        elapsed_ms: u64,
        kind: String,
        reason: String,
    },
}

impl StepEvent {
    pub fn stage(&self) -> Stage {
        match self {
            StepEvent::AttemptStarted { stage, .. }
            | StepEvent::StepSucceeded { stage, .. }
            | StepEvent::StepFailed { stage, .. } => *stage,
        }
    }
}

/// Receiver of step events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &StepEvent);
}

/// Renders events as tracing records
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &StepEvent) {
        match event {
            StepEvent::AttemptStarted {
                stage,
                attempt,
                max_attempts,
            } => info!(stage = %stage, "Attempt {}/{}", attempt, max_attempts),
            StepEvent::StepSucceeded {
                stage,
                attempts,
                elapsed_ms,
            } => info!(
                stage = %stage,
                attempts,
                elapsed_ms,
                "Step succeeded"
            ),
            StepEvent::StepFailed {
                stage,
                attempts,
                elapsed_ms,
                kind,
                reason,
            } => warn!(
                stage = %stage,
                attempts,
                elapsed_ms,
                kind = %kind,
                "Step failed: {}",
                reason
            ),
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<StepEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StepEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Stages for which at least one attempt started, in order
    pub fn started_stages(&self) -> Vec<Stage> {
        let mut stages: Vec<Stage> = Vec::new();
        for event in self.events() {
            if let StepEvent::AttemptStarted { stage, .. } = event {
                if stages.last() != Some(&stage) {
                    stages.push(stage);
                }
            }
        }
        stages
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &StepEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

/// Forwards every event to each inner sink
#[derive(Default, Clone)]
pub struct Broadcast {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Broadcast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for Broadcast {
    fn emit(&self, event: &StepEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
