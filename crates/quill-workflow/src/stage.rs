//! The fixed stages of the publication workflow

use serde::{Deserialize, Serialize};
use std::fmt;

/// One state of the linear workflow; each is implemented by exactly one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Launch,
    NavigateToAuthSurface,
    SubmitCredentials,
    ConfirmAuthenticated,
    NavigateToTargetSurface,
    OpenComposer,
    InjectContent,
    SubmitContent,
    VerifySubmission,
}

impl Stage {
    /// Declaration order is execution order
    pub const ALL: [Stage; 9] = [
        Stage::Launch,
        Stage::NavigateToAuthSurface,
        Stage::SubmitCredentials,
        Stage::ConfirmAuthenticated,
        Stage::NavigateToTargetSurface,
        Stage::OpenComposer,
        Stage::InjectContent,
        Stage::SubmitContent,
        Stage::VerifySubmission,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Launch => "Launch",
            Stage::NavigateToAuthSurface => "NavigateToAuthSurface",
            Stage::SubmitCredentials => "SubmitCredentials",
            Stage::ConfirmAuthenticated => "ConfirmAuthenticated",
            Stage::NavigateToTargetSurface => "NavigateToTargetSurface",
            Stage::OpenComposer => "OpenComposer",
            Stage::InjectContent => "InjectContent",
            Stage::SubmitContent => "SubmitContent",
            Stage::VerifySubmission => "VerifySubmission",
        }
    }

    pub fn first() -> Stage {
        Stage::ALL[0]
    }

    /// The following stage, `None` after the last one
    pub fn next(self) -> Option<Stage> {
        let position = Stage::ALL.iter().position(|s| *s == self)?;
        Stage::ALL.get(position + 1).copied()
    }

    /// Whether a failure here may follow a click on the submit control
    pub fn may_have_published(self) -> bool {
        self >= Stage::SubmitContent
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_are_linear() {
        let mut walked = vec![Stage::first()];
        while let Some(next) = walked.last().and_then(|s| s.next()) {
            walked.push(next);
        }
        assert_eq!(walked, Stage::ALL.to_vec());
        assert_eq!(Stage::VerifySubmission.next(), None);
    }

    #[test]
    fn test_publication_boundary() {
        assert!(!Stage::InjectContent.may_have_published());
        assert!(Stage::SubmitContent.may_have_published());
        assert!(Stage::VerifySubmission.may_have_published());
    }

    #[test]
    fn test_display_matches_name() {
        assert_eq!(Stage::ConfirmAuthenticated.to_string(), "ConfirmAuthenticated");
    }
}
