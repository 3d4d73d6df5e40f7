//! Pure state machine for the publication workflow
//!
//! No I/O and no async: `transition(state, event) -> (state, actions)`.
//! The runner in [`crate::workflow`] performs the actions and feeds back
//! the events.
//!
//! - Transitions are linear and forward-only; no stage is ever skipped
//! - A failed stage goes straight to `Failed`; there is no rollback or resume
//! - Terminal states absorb further events
//! - Any other invalid transition goes to `Failed` (never panics)

use crate::stage::Stage;

/// Workflow state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    /// Session open, nothing run yet
    Ready,
    /// A stage's step is in flight
    Running { stage: Stage },
    /// Every stage completed
    Succeeded,
    /// A stage exhausted its budget
    Failed { stage: Stage, reason: String },
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Succeeded | State::Failed { .. })
    }
}

/// Events reported by the runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Begin the run
    Start,
    /// The running stage's step succeeded
    StageSucceeded,
    /// The running stage's step failed for good
    StageFailed { reason: String },
}

/// Side effects the runner must perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Execute the step implementing `stage`
    RunStep { stage: Stage },
    /// Snapshot the page for the failed stage
    CaptureDiagnostics { stage: Stage },
    /// Log activity
    LogActivity { message: String },
}

/// Pure state transition function
///
/// # Invalid Transitions
/// Any invalid transition from a non-terminal state results in a Failed
/// state with a descriptive reason. This function never panics.
pub fn transition(state: State, event: Event) -> (State, Vec<Action>) {
    match (state, event) {
        (State::Ready, Event::Start) => {
            let stage = Stage::first();
            (
                State::Running { stage },
                vec![
                    Action::LogActivity {
                        message: "Starting publication workflow".to_string(),
                    },
                    Action::RunStep { stage },
                ],
            )
        }

        (State::Running { stage }, Event::StageSucceeded) => match stage.next() {
            Some(next) => (State::Running { stage: next }, vec![Action::RunStep { stage: next }]),
            None => (
                State::Succeeded,
                vec![Action::LogActivity {
                    message: "Publication workflow succeeded".to_string(),
                }],
            ),
        },

        (State::Running { stage }, Event::StageFailed { reason }) => {
            let actions = vec![
                Action::LogActivity {
                    message: format!("{} failed: {}", stage, reason),
                },
                Action::CaptureDiagnostics { stage },
            ];
            (State::Failed { stage, reason }, actions)
        }

        // Terminal states absorb everything
        (terminal @ (State::Succeeded | State::Failed { .. }), event) => (
            terminal,
            vec![Action::LogActivity {
                message: format!("Ignoring {:?} after the run ended", event),
            }],
        ),

        // Invalid transitions
        (state, event) => {
            let stage = match &state {
                State::Running { stage } => *stage,
                _ => Stage::first(),
            };
            let reason = format!("Invalid transition from {:?} on {:?}", state, event);
            (
                State::Failed {
                    stage,
                    reason: reason.clone(),
                },
                vec![Action::LogActivity { message: reason }],
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_steps(count: usize) -> State {
        let (mut state, _) = transition(State::Ready, Event::Start);
        for _ in 0..count {
            state = transition(state, Event::StageSucceeded).0;
        }
        state
    }

    #[test]
    fn test_start_runs_first_stage() {
        let (state, actions) = transition(State::Ready, Event::Start);
        assert_eq!(state, State::Running { stage: Stage::Launch });
        assert!(actions.contains(&Action::RunStep { stage: Stage::Launch }));
    }

    #[test]
    fn test_full_run_visits_every_stage_in_order() {
        let (mut state, mut actions) = transition(State::Ready, Event::Start);
        let mut visited = Vec::new();
        loop {
            for action in &actions {
                if let Action::RunStep { stage } = action {
                    visited.push(*stage);
                }
            }
            if state.is_terminal() {
                break;
            }
            (state, actions) = transition(state, Event::StageSucceeded);
        }
        assert_eq!(state, State::Succeeded);
        assert_eq!(visited, Stage::ALL.to_vec());
    }

    #[test]
    fn test_failure_is_terminal_and_requests_diagnostics() {
        let state = run_steps(3);
        assert_eq!(state, State::Running { stage: Stage::ConfirmAuthenticated });

        let (state, actions) = transition(
            state,
            Event::StageFailed {
                reason: "challenge".to_string(),
            },
        );
        assert_eq!(
            state,
            State::Failed {
                stage: Stage::ConfirmAuthenticated,
                reason: "challenge".to_string()
            }
        );
        assert!(actions.contains(&Action::CaptureDiagnostics {
            stage: Stage::ConfirmAuthenticated
        }));

        let (after, actions) = transition(state.clone(), Event::StageSucceeded);
        assert_eq!(after, state);
        assert!(!actions.iter().any(|a| matches!(a, Action::RunStep { .. })));
    }

    #[test]
    fn test_invalid_transition_fails() {
        let (state, _) = transition(State::Ready, Event::StageSucceeded);
        assert!(matches!(state, State::Failed { stage: Stage::Launch, .. }));

        let (state, _) = transition(run_steps(2), Event::Start);
        assert!(matches!(
            state,
            State::Failed {
                stage: Stage::SubmitCredentials,
                ..
            }
        ));
    }
}
