//! Run phases.
//!
//! ```text
//! Start -> FetchingMembership -> LoadingLedger -> Diffing -> Done
//!                                                   |
//!                                                   v
//!                       Authorizing -> Dispersing(0) -> Committing(0) -> Dispersing(1) -> ... -> Done
//! ```
//!
//! Any error moves the run to `Failed`, which is terminal.

use serde::{Deserialize, Serialize};

/// Where a run currently is. Batch indices are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "batch", rename_all = "snake_case")]
pub enum RunPhase {
    Start,
    FetchingMembership,
    LoadingLedger,
    Diffing,
    Authorizing,
    Dispersing(usize),
    Committing(usize),
    Done,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(&self, next: RunPhase) -> bool {
        use RunPhase::*;
        if self.is_terminal() {
            return false;
        }
        match (*self, next) {
            (_, Failed) => true,
            (Start, FetchingMembership)
            | (FetchingMembership, LoadingLedger)
            | (LoadingLedger, Diffing)
            | (Diffing, Done)
            | (Diffing, Authorizing)
            | (Authorizing, Dispersing(0)) => true,
            (Dispersing(i), Committing(j)) => i == j,
            (Committing(i), Dispersing(j)) => j == i + 1,
            (Committing(_), Done) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::FetchingMembership => write!(f, "fetching_membership"),
            Self::LoadingLedger => write!(f, "loading_ledger"),
            Self::Diffing => write!(f, "diffing"),
            Self::Authorizing => write!(f, "authorizing"),
            Self::Dispersing(i) => write!(f, "dispersing(batch {})", i + 1),
            Self::Committing(i) => write!(f, "committing(batch {})", i + 1),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_legal() {
        let path = [
            RunPhase::Start,
            RunPhase::FetchingMembership,
            RunPhase::LoadingLedger,
            RunPhase::Diffing,
            RunPhase::Authorizing,
            RunPhase::Dispersing(0),
            RunPhase::Committing(0),
            RunPhase::Dispersing(1),
            RunPhase::Committing(1),
            RunPhase::Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn batches_cannot_be_skipped_or_interleaved() {
        assert!(!RunPhase::Committing(0).can_advance_to(RunPhase::Dispersing(2)));
        assert!(!RunPhase::Dispersing(1).can_advance_to(RunPhase::Committing(0)));
        assert!(!RunPhase::Dispersing(0).can_advance_to(RunPhase::Dispersing(1)));
        assert!(!RunPhase::Diffing.can_advance_to(RunPhase::Dispersing(0)));
    }

    #[test]
    fn terminal_phases_are_final() {
        assert!(!RunPhase::Done.can_advance_to(RunPhase::Failed));
        assert!(!RunPhase::Failed.can_advance_to(RunPhase::Start));
        assert!(RunPhase::Authorizing.can_advance_to(RunPhase::Failed));
    }

    #[test]
    fn serializes_with_batch_content() {
        let json = serde_json::to_value(RunPhase::Committing(3)).unwrap();
        assert_eq!(json, serde_json::json!({"phase": "committing", "batch": 3}));
        let json = serde_json::to_value(RunPhase::Done).unwrap();
        assert_eq!(json, serde_json::json!({"phase": "done"}));
    }
}
