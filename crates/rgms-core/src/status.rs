//! # Proposal Status
//!
//! Closed status enum with an explicit transition table. Anything not in
//! [`ProposalStatus::can_transition`] is rejected.

use crate::error::{Result, RgmsError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    Draft,
    Pending,
    ReviewComplete,
    Approved,
    /// Funded, and the HOD marked progress as on track.
    OnTrack,
    /// Funded, and the HOD flagged the project for intervention.
    NeedsIntervention,
    Rejected,
}

/// HOD verdict attached to an intervention entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectHealth {
    OnTrack,
    NeedsIntervention,
}

impl ProjectHealth {
    /// Status a funded proposal moves to under this verdict.
    #[must_use]
    pub fn status(self) -> ProposalStatus {
        match self {
            Self::OnTrack => ProposalStatus::OnTrack,
            Self::NeedsIntervention => ProposalStatus::NeedsIntervention,
        }
    }
}

impl ProposalStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 7] = [
        Self::Draft,
        Self::Pending,
        Self::ReviewComplete,
        Self::Approved,
        Self::OnTrack,
        Self::NeedsIntervention,
        Self::Rejected,
    ];

    /// The transition table.
    #[must_use]
    pub fn can_transition(self, to: Self) -> bool {
        use ProposalStatus::{
            Approved, Draft, NeedsIntervention, OnTrack, Pending, Rejected, ReviewComplete,
        };
        matches!(
            (self, to),
            (Draft, Pending)
                | (Pending, ReviewComplete)
                | (Pending, Rejected)
                | (ReviewComplete, Approved)
                | (ReviewComplete, Rejected)
                | (Approved | OnTrack | NeedsIntervention, OnTrack | NeedsIntervention)
        )
    }

    /// Check a transition, naming both ends on failure.
    pub fn transition(self, to: Self) -> Result<Self> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(RgmsError::IllegalStateTransition(format!("{self} -> {to}")))
        }
    }

    /// Whether a grant backs this proposal.
    #[must_use]
    pub fn is_funded(self) -> bool {
        matches!(self, Self::Approved | Self::OnTrack | Self::NeedsIntervention)
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Rejected
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Draft => "Draft",
            Self::Pending => "Pending",
            Self::ReviewComplete => "Review Complete",
            Self::Approved => "Approved",
            Self::OnTrack => "On Track",
            Self::NeedsIntervention => "Needs Intervention",
            Self::Rejected => "Rejected",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_allowed() {
        let s = ProposalStatus::Draft;
        let s = s.transition(ProposalStatus::Pending).ok();
        let s = s.and_then(|s| s.transition(ProposalStatus::ReviewComplete).ok());
        let s = s.and_then(|s| s.transition(ProposalStatus::Approved).ok());
        assert_eq!(s, Some(ProposalStatus::Approved));
    }

    #[test]
    fn rejected_is_terminal() {
        for to in ProposalStatus::ALL {
            assert!(!ProposalStatus::Rejected.can_transition(to));
        }
    }

    #[test]
    fn funded_proposals_cannot_be_rejected() {
        for from in [
            ProposalStatus::Approved,
            ProposalStatus::OnTrack,
            ProposalStatus::NeedsIntervention,
        ] {
            assert!(from.is_funded());
            assert!(from.transition(ProposalStatus::Rejected).is_err());
        }
    }

    #[test]
    fn health_flags_only_apply_to_funded_proposals() {
        assert!(ProposalStatus::Approved.can_transition(ProposalStatus::NeedsIntervention));
        assert!(ProposalStatus::NeedsIntervention.can_transition(ProposalStatus::OnTrack));
        assert!(!ProposalStatus::Pending.can_transition(ProposalStatus::OnTrack));
    }

    #[test]
    fn draft_cannot_skip_review() {
        assert!(!ProposalStatus::Draft.can_transition(ProposalStatus::Approved));
        assert!(!ProposalStatus::Pending.can_transition(ProposalStatus::Approved));
    }
}
