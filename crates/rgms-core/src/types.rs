//! # Records
//!
//! Proposal, evaluation and progress report rows. Grant and budget rows live
//! in [`crate::ledger`] next to the invariants that guard them.

use crate::{ActorId, Amount, EvaluationId, ProposalId, ProposalStatus, ReportId, Version};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A researcher's funding request. One row per version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    /// Owning researcher.
    pub researcher: ActorId,
    pub title: String,
    pub requested: Amount,
    pub status: ProposalStatus,
    pub version: Version,
    pub submitted_on: NaiveDate,
}

impl Proposal {
    /// Whether this proposal belongs to the given (researcher, title) chain.
    #[must_use]
    pub fn in_chain(&self, researcher: ActorId, title: &str) -> bool {
        self.researcher == researcher && self.title == title
    }
}

/// A reviewer's score and comments for one proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: EvaluationId,
    pub proposal: ProposalId,
    pub reviewer: ActorId,
    pub score: u8,
    pub comments: String,
}

/// Origin of a progress log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportKind {
    /// Submitted by the owning researcher.
    Progress,
    /// HOD feedback on a project that is on track.
    HodFeedback,
    /// HOD feedback flagging the project for intervention.
    HodIntervention,
}

impl ReportKind {
    /// Label shown in front of HOD entries.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Progress => "Progress Report",
            Self::HodFeedback => "HOD Feedback",
            Self::HodIntervention => "HOD Intervention Required",
        }
    }

    #[must_use]
    pub fn is_hod_entry(self) -> bool {
        !matches!(self, Self::Progress)
    }
}

/// Append-only progress log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub id: ReportId,
    pub proposal: ProposalId,
    pub author: ActorId,
    pub kind: ReportKind,
    pub content: String,
    pub milestones: String,
    /// Spend claimed by this entry. Zero for HOD entries.
    pub expenditure: Amount,
    pub submitted_on: NaiveDate,
}
