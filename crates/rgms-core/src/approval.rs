//! # Approval Workflow
//!
//! Turns a reviewed proposal plus an HOD decision into a funded grant, or a
//! rejection, and handles post-approval top-ups.
//!
//! ## Fund deduction rules
//!
//! - First approval of a proposal debits the full allocation from the HOD's
//!   department budget and opens a grant with an empty budget.
//! - A repeated approval updates the existing grant's terms and never
//!   touches the department budget. It may keep or lower the allocation
//!   (not below what is already spent); raising it goes through a top-up.
//! - A top-up raises the allocation and debits the department. Spend is
//!   untouched, so usage can only fall.
//!
//! Required role for every operation here: HOD ([`Approver`]).

use crate::actor::Approver;
use crate::error::{Result, RgmsError};
use crate::ledger::GrantTerms;
use crate::tracker::Tracker;
use crate::types::Proposal;
use crate::{ActorId, Amount, GrantId, ProposalId, ProposalStatus, UsagePercent};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Result of a successful approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalReceipt {
    pub proposal: ProposalId,
    pub grant: GrantId,
    /// Whether this call created the grant.
    pub created: bool,
    pub allocated: Amount,
    /// Amount taken from the department budget by this call.
    pub debited: Amount,
    pub department_available: Amount,
}

/// Result of a successful top-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopUpReceipt {
    pub grant: GrantId,
    pub allocated: Amount,
    pub department_available: Amount,
    pub usage: UsagePercent,
}

impl Tracker {
    /// Approve a reviewed proposal and fund it from the HOD's department.
    ///
    /// Fails with `InvalidDateRange` unless `start < end`, with
    /// `InsufficientFunds` when the department cannot cover the debit, and
    /// with `IllegalStateTransition` unless the proposal is `ReviewComplete`
    /// (or already funded by this HOD, which takes the update path).
    /// On the update path a higher allocation is `IllegalStateTransition`.
    pub fn approve(
        &mut self,
        hod: &impl Approver,
        proposal_id: ProposalId,
        terms: GrantTerms,
    ) -> Result<ApprovalReceipt> {
        terms.validate()?;
        let hod_id = hod.approver_id();
        let proposal = self.proposal(proposal_id)?;
        let researcher = proposal.researcher;
        let title = proposal.title.clone();

        let debit = match self.ledger.grant_for(proposal_id) {
            None => {
                proposal.status.transition(ProposalStatus::Approved)?;
                terms.allocated
            }
            Some(grant) => {
                if grant.approved_by != hod_id {
                    return Err(RgmsError::Unauthorized(format!(
                        "{} is funded by {}, not {hod_id}",
                        grant.id, grant.approved_by
                    )));
                }
                let spent = self
                    .ledger
                    .budget(grant.id)
                    .map(|b| b.total_spent)
                    .unwrap_or(Amount::ZERO);
                if terms.allocated < spent {
                    return Err(RgmsError::BudgetExceeded {
                        requested: spent,
                        remaining: terms.allocated.saturating_sub(spent),
                        allocated: terms.allocated,
                    });
                }
                if terms.allocated > grant.allocated {
                    return Err(RgmsError::IllegalStateTransition(format!(
                        "{} already holds {}; raise it with a top-up",
                        grant.id, grant.allocated
                    )));
                }
                Amount::ZERO
            }
        };

        let department = self.department(hod_id)?;
        department.ensure_covers(debit)?;
        let seen_revision = department.revision();

        // All checks passed; apply.
        if debit.is_positive() {
            self.department_mut(hod_id)?.debit(debit, seen_revision)?;
        }
        let (grant, created) = self.ledger.open_or_update(proposal_id, hod_id, terms)?;
        if created {
            self.proposal_mut(proposal_id)?.status = ProposalStatus::Approved;
        }
        self.touch();

        let department_available = self.department(hod_id)?.available();
        info!(
            proposal = %proposal_id,
            %grant,
            allocated = %terms.allocated,
            debited = %debit,
            %department_available,
            created,
            "proposal approved"
        );
        let message = if created {
            format!(
                "Your proposal '{title}' was approved with {} allocated.",
                terms.allocated
            )
        } else {
            format!(
                "The grant for '{title}' was updated: {} allocated, {} to {}.",
                terms.allocated, terms.start, terms.end
            )
        };
        self.notify(researcher, &message, &grant_link(proposal_id));

        Ok(ApprovalReceipt {
            proposal: proposal_id,
            grant,
            created,
            allocated: terms.allocated,
            debited: debit,
            department_available,
        })
    }

    /// Reject a proposal. Rejected is terminal.
    ///
    /// Fails with `IllegalStateTransition` for drafts, funded proposals and
    /// proposals that are already rejected.
    pub fn reject(
        &mut self,
        hod: &impl Approver,
        proposal_id: ProposalId,
        reason: &str,
    ) -> Result<Proposal> {
        let proposal = self.proposal(proposal_id)?;
        if self.ledger.grant_for(proposal_id).is_some() {
            return Err(RgmsError::IllegalStateTransition(format!(
                "{proposal_id} already holds a grant"
            )));
        }
        let next = proposal.status.transition(ProposalStatus::Rejected)?;
        let researcher = proposal.researcher;
        let title = proposal.title.clone();

        let updated = {
            let p = self.proposal_mut(proposal_id)?;
            p.status = next;
            p.clone()
        };
        self.touch();
        info!(proposal = %proposal_id, hod = %hod.approver_id(), "proposal rejected");

        let reason = reason.trim();
        let message = if reason.is_empty() {
            format!("Your proposal '{title}' was rejected.")
        } else {
            format!("Your proposal '{title}' was rejected: {reason}")
        };
        self.notify(researcher, &message, &proposal_link(proposal_id));
        Ok(updated)
    }

    /// Raise a grant's allocation from the HOD's department budget.
    pub fn top_up(
        &mut self,
        hod: &impl Approver,
        grant_id: GrantId,
        amount: Amount,
    ) -> Result<TopUpReceipt> {
        if !amount.is_positive() {
            return Err(RgmsError::InvalidInput(format!(
                "top-up must be positive, got {amount}"
            )));
        }
        let hod_id = hod.approver_id();
        let grant = self
            .ledger
            .grant(grant_id)
            .ok_or_else(|| RgmsError::not_found(grant_id))?;
        if grant.approved_by != hod_id {
            return Err(RgmsError::Unauthorized(format!(
                "{grant_id} is funded by {}, not {hod_id}",
                grant.approved_by
            )));
        }
        let proposal_id = grant.proposal;
        grant.allocated.checked_add(amount)?;
        let department = self.department(hod_id)?;
        department.ensure_covers(amount)?;
        let seen_revision = department.revision();

        self.department_mut(hod_id)?.debit(amount, seen_revision)?;
        let allocated = self.ledger.add_capacity(grant_id, amount)?;
        self.touch();

        let department_available = self.department(hod_id)?.available();
        let usage = self.ledger.usage_percent(grant_id)?;
        info!(
            grant = %grant_id,
            %amount,
            %allocated,
            %department_available,
            %usage,
            "grant topped up"
        );
        if let Ok(proposal) = self.proposal(proposal_id) {
            let researcher = proposal.researcher;
            let message = format!(
                "Your grant for '{}' was topped up by {amount}; {allocated} now allocated.",
                proposal.title
            );
            self.notify(researcher, &message, &grant_link(proposal_id));
        }

        Ok(TopUpReceipt {
            grant: grant_id,
            allocated,
            department_available,
            usage,
        })
    }

    fn department_mut(&mut self, hod: ActorId) -> Result<&mut crate::DepartmentBudget> {
        self.departments
            .get_mut(&hod)
            .ok_or_else(|| RgmsError::NotFound(format!("department budget of {hod}")))
    }
}

pub(crate) fn grant_link(proposal: ProposalId) -> String {
    format!("/grants/{}", proposal.0)
}

pub(crate) fn proposal_link(proposal: ProposalId) -> String {
    format!("/proposals/{}", proposal.0)
}

// =============================================================================
// TESTS
// =============================================================================
