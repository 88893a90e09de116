//! # Progress Tracker
//!
//! Researchers append progress reports, optionally claiming expenditure
//! against their grant. HODs append feedback or intervention entries and set
//! the project health flag.
//!
//! A report on a proposal without a grant is still stored; the claimed
//! expenditure is recorded as unapplied ([`ExpenditureOutcome::NoGrant`])
//! and logged. Over-spend is rejected with `BudgetExceeded` and nothing is
//! stored.

use crate::actor::{Approver, Submitter};
use crate::approval::grant_link;
use crate::error::{Result, RgmsError};
use crate::tracker::Tracker;
use crate::types::{ProgressReport, ReportKind};
use crate::{Amount, GrantId, ProjectHealth, ProposalId, ProposalStatus, ReportId, UsagePercent};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Researcher input for a progress report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDraft {
    pub content: String,
    pub milestones: String,
    pub expenditure: Amount,
}

impl ReportDraft {
    #[must_use]
    pub fn new(content: impl Into<String>, milestones: impl Into<String>, expenditure: Amount) -> Self {
        Self {
            content: content.into(),
            milestones: milestones.into(),
            expenditure,
        }
    }
}

/// What happened to the expenditure claimed by a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenditureOutcome {
    /// The report claimed no spend.
    NotClaimed,
    /// Spend was added to the grant's budget.
    Recorded {
        grant: GrantId,
        total_spent: Amount,
        remaining: Amount,
    },
    /// No grant exists yet; the report was kept, the spend was not applied.
    NoGrant,
}

/// Result of a stored progress report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportReceipt {
    pub report: ReportId,
    pub expenditure: ExpenditureOutcome,
    /// Usage after the report, when a grant exists.
    pub usage: Option<UsagePercent>,
    /// Usage is above the alert threshold.
    pub alert: bool,
}

impl Tracker {
    /// Append a progress report. Required role: Researcher (owner).
    pub fn submit_report(
        &mut self,
        researcher: &impl Submitter,
        proposal_id: ProposalId,
        draft: ReportDraft,
        submitted_on: NaiveDate,
    ) -> Result<ReportReceipt> {
        let owner = researcher.submitter_id();
        let proposal = self.owned_proposal(owner, proposal_id)?;
        if matches!(proposal.status, ProposalStatus::Draft | ProposalStatus::Rejected) {
            return Err(RgmsError::IllegalStateTransition(format!(
                "cannot report on a {} proposal",
                proposal.status
            )));
        }
        if draft.content.trim().is_empty() {
            return Err(RgmsError::InvalidInput("report content cannot be empty".into()));
        }
        if draft.expenditure.is_negative() {
            return Err(RgmsError::InvalidInput(format!(
                "expenditure cannot be negative, got {}",
                draft.expenditure
            )));
        }
        let title = proposal.title.clone();
        let grant = self.ledger.grant_for(proposal_id).map(|g| (g.id, g.approved_by));
        if let Some((grant_id, _)) = grant {
            self.ledger.check_spend(grant_id, draft.expenditure)?;
        }

        // All checks passed; apply.
        let report_id = ReportId(self.next_report);
        self.next_report = self.next_report.saturating_add(1);
        let expenditure = draft.expenditure;
        self.reports.insert(
            report_id,
            ProgressReport {
                id: report_id,
                proposal: proposal_id,
                author: owner,
                kind: ReportKind::Progress,
                content: draft.content,
                milestones: draft.milestones,
                expenditure,
                submitted_on,
            },
        );

        let outcome = match grant {
            Some((grant_id, _)) if expenditure.is_positive() => {
                let total_spent =
                    self.ledger
                        .record_spend(grant_id, report_id, expenditure, submitted_on)?;
                ExpenditureOutcome::Recorded {
                    grant: grant_id,
                    total_spent,
                    remaining: self.ledger.remaining_balance(grant_id)?,
                }
            }
            None if expenditure.is_positive() => {
                warn!(
                    proposal = %proposal_id,
                    %expenditure,
                    "expenditure reported before a grant exists; not applied"
                );
                ExpenditureOutcome::NoGrant
            }
            _ => ExpenditureOutcome::NotClaimed,
        };
        self.touch();

        let usage = match grant {
            Some((grant_id, _)) => Some(self.ledger.usage_percent(grant_id)?),
            None => None,
        };
        let alert = usage.is_some_and(UsagePercent::is_alert);
        if let Some(u) = usage.filter(|u| u.is_alert()) {
            warn!(proposal = %proposal_id, usage = %u, "grant usage above alert threshold");
        }
        debug!(report = %report_id, proposal = %proposal_id, ?outcome, "progress report stored");

        if let Some((_, hod)) = grant {
            let message = match usage {
                Some(u) if alert => {
                    format!("New progress report for '{title}'. Budget usage is at {u}%.")
                }
                _ => format!("New progress report for '{title}'."),
            };
            self.notify(hod, &message, &grant_link(proposal_id));
        }

        Ok(ReportReceipt {
            report: report_id,
            expenditure: outcome,
            usage,
            alert,
        })
    }

    /// Append HOD feedback to a funded project and set its health flag.
    /// Required role: HOD (the one funding the grant).
    pub fn record_intervention(
        &mut self,
        hod: &impl Approver,
        proposal_id: ProposalId,
        feedback: &str,
        health: ProjectHealth,
        recorded_on: NaiveDate,
    ) -> Result<ReportId> {
        let hod_id = hod.approver_id();
        let feedback = feedback.trim();
        if feedback.is_empty() {
            return Err(RgmsError::InvalidInput("feedback cannot be empty".into()));
        }
        let proposal = self.proposal(proposal_id)?;
        let next = proposal.status.transition(health.status())?;
        let grant = self
            .ledger
            .grant_for(proposal_id)
            .ok_or_else(|| RgmsError::NotFound(format!("grant for {proposal_id}")))?;
        if grant.approved_by != hod_id {
            return Err(RgmsError::Unauthorized(format!(
                "{} is funded by {}, not {hod_id}",
                grant.id, grant.approved_by
            )));
        }
        let researcher = proposal.researcher;
        let title = proposal.title.clone();
        let kind = match health {
            ProjectHealth::OnTrack => ReportKind::HodFeedback,
            ProjectHealth::NeedsIntervention => ReportKind::HodIntervention,
        };

        let report_id = ReportId(self.next_report);
        self.next_report = self.next_report.saturating_add(1);
        self.reports.insert(
            report_id,
            ProgressReport {
                id: report_id,
                proposal: proposal_id,
                author: hod_id,
                kind,
                content: format!("{}: {feedback}", kind.label()),
                milestones: String::new(),
                expenditure: Amount::ZERO,
                submitted_on: recorded_on,
            },
        );
        self.proposal_mut(proposal_id)?.status = next;
        self.touch();
        info!(proposal = %proposal_id, status = %next, "HOD entry recorded");

        let message = match health {
            ProjectHealth::OnTrack => format!("Feedback from HOD on '{title}': {feedback}"),
            ProjectHealth::NeedsIntervention => {
                format!("URGENT: intervention required on '{title}': {feedback}")
            }
        };
        self.notify(researcher, &message, &grant_link(proposal_id));
        Ok(report_id)
    }
}

// =============================================================================
// TESTS
// =============================================================================
