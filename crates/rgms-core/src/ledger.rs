//! # Ledger
//!
//! Grant and budget rows, one-to-one with an approved proposal.
//!
//! ## Invariants
//!
//! - At most one grant per proposal; a second approval updates it.
//! - `Budget::total_spent` only grows, and only through [`Ledger::record_spend`].
//! - `total_spent <= allocated` at all times (over-spend is rejected).
//! - The remaining balance is never stored: it is `allocated - total_spent`,
//!   computed on read.

use crate::error::{Result, RgmsError};
use crate::{ActorId, Amount, GrantId, ProposalId, ReportId, UsagePercent};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// ROWS
// =============================================================================

/// Funded outcome of an approved proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub id: GrantId,
    pub proposal: ProposalId,
    /// HOD whose department funds this grant.
    pub approved_by: ActorId,
    pub allocated: Amount,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// One accepted expenditure claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenditureEntry {
    pub report: ReportId,
    pub amount: Amount,
    pub recorded_on: NaiveDate,
}

/// Spend ledger of a grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub grant: GrantId,
    pub total_spent: Amount,
    pub expenditures: Vec<ExpenditureEntry>,
}

impl Budget {
    fn opened(grant: GrantId) -> Self {
        Self {
            grant,
            total_spent: Amount::ZERO,
            expenditures: Vec::new(),
        }
    }
}

/// Allocation and date range requested at approval time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantTerms {
    pub allocated: Amount,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl GrantTerms {
    /// Amount must be positive and `start < end`.
    pub fn validate(&self) -> Result<()> {
        if !self.allocated.is_positive() {
            return Err(RgmsError::InvalidInput(format!(
                "allocated amount must be positive, got {}",
                self.allocated
            )));
        }
        if self.start >= self.end {
            return Err(RgmsError::InvalidDateRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }
}

/// Read-only view of a grant and its budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantOverview {
    pub grant: GrantId,
    pub proposal: ProposalId,
    pub allocated: Amount,
    pub total_spent: Amount,
    pub remaining: Amount,
    pub usage: UsagePercent,
    pub alert: bool,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub expenditure_count: usize,
}

// =============================================================================
// LEDGER
// =============================================================================

/// Owner of all grant and budget rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    grants: BTreeMap<GrantId, Grant>,
    budgets: BTreeMap<GrantId, Budget>,
    by_proposal: BTreeMap<ProposalId, GrantId>,
    next_grant_id: u64,
}

impl Ledger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted rows. Every grant must have exactly one budget.
    pub fn from_rows(grants: Vec<Grant>, budgets: Vec<Budget>, next_grant_id: u64) -> Result<Self> {
        let mut ledger = Self {
            next_grant_id,
            ..Self::default()
        };
        for grant in grants {
            if ledger.by_proposal.insert(grant.proposal, grant.id).is_some() {
                return Err(RgmsError::persistence(format!(
                    "{} has more than one grant",
                    grant.proposal
                )));
            }
            ledger.next_grant_id = ledger.next_grant_id.max(grant.id.0.saturating_add(1));
            ledger.grants.insert(grant.id, grant);
        }
        for budget in budgets {
            if !ledger.grants.contains_key(&budget.grant) {
                return Err(RgmsError::persistence(format!(
                    "budget for unknown {}",
                    budget.grant
                )));
            }
            ledger.budgets.insert(budget.grant, budget);
        }
        if ledger.budgets.len() != ledger.grants.len() {
            return Err(RgmsError::persistence("grant without a budget"));
        }
        Ok(ledger)
    }

    pub fn grants(&self) -> impl Iterator<Item = &Grant> {
        self.grants.values()
    }

    pub fn budgets(&self) -> impl Iterator<Item = &Budget> {
        self.budgets.values()
    }

    #[must_use]
    pub fn next_grant_id(&self) -> u64 {
        self.next_grant_id
    }

    #[must_use]
    pub fn grant(&self, id: GrantId) -> Option<&Grant> {
        self.grants.get(&id)
    }

    #[must_use]
    pub fn budget(&self, id: GrantId) -> Option<&Budget> {
        self.budgets.get(&id)
    }

    /// Grant backing a proposal, if it was ever approved.
    #[must_use]
    pub fn grant_for(&self, proposal: ProposalId) -> Option<&Grant> {
        self.by_proposal.get(&proposal).and_then(|id| self.grants.get(id))
    }

    /// Open a grant with an empty budget, or update the existing one.
    ///
    /// Returns the grant id and whether it was newly created. Updating never
    /// lowers the allocation below what was already spent.
    pub(crate) fn open_or_update(
        &mut self,
        proposal: ProposalId,
        approved_by: ActorId,
        terms: GrantTerms,
    ) -> Result<(GrantId, bool)> {
        if let Some(&id) = self.by_proposal.get(&proposal) {
            let spent = self.spent(id)?;
            let grant = self
                .grants
                .get_mut(&id)
                .ok_or_else(|| RgmsError::not_found(id))?;
            if terms.allocated < spent {
                return Err(RgmsError::BudgetExceeded {
                    requested: spent,
                    remaining: terms.allocated.saturating_sub(spent),
                    allocated: terms.allocated,
                });
            }
            grant.allocated = terms.allocated;
            grant.start = terms.start;
            grant.end = terms.end;
            return Ok((id, false));
        }

        let id = GrantId(self.next_grant_id);
        self.next_grant_id = self.next_grant_id.saturating_add(1);
        self.grants.insert(
            id,
            Grant {
                id,
                proposal,
                approved_by,
                allocated: terms.allocated,
                start: terms.start,
                end: terms.end,
            },
        );
        self.budgets.insert(id, Budget::opened(id));
        self.by_proposal.insert(proposal, id);
        Ok((id, true))
    }

    fn spent(&self, id: GrantId) -> Result<Amount> {
        self.budgets
            .get(&id)
            .map(|b| b.total_spent)
            .ok_or_else(|| RgmsError::NotFound(format!("budget of {id}")))
    }

    fn allocated(&self, id: GrantId) -> Result<Amount> {
        self.grants
            .get(&id)
            .map(|g| g.allocated)
            .ok_or_else(|| RgmsError::not_found(id))
    }

    /// `allocated - total_spent`, computed on read.
    pub fn remaining_balance(&self, id: GrantId) -> Result<Amount> {
        Ok(self.allocated(id)?.saturating_sub(self.spent(id)?))
    }

    pub fn usage_percent(&self, id: GrantId) -> Result<UsagePercent> {
        Ok(UsagePercent::of(self.spent(id)?, self.allocated(id)?))
    }

    /// Reject an expenditure that would exceed the allocation.
    pub fn check_spend(&self, id: GrantId, amount: Amount) -> Result<()> {
        if amount.is_negative() {
            return Err(RgmsError::InvalidInput(format!(
                "expenditure cannot be negative, got {amount}"
            )));
        }
        let allocated = self.allocated(id)?;
        let remaining = self.remaining_balance(id)?;
        if amount > remaining {
            return Err(RgmsError::BudgetExceeded {
                requested: amount,
                remaining,
                allocated,
            });
        }
        Ok(())
    }

    /// Add an accepted expenditure to the budget. Returns the new total spend.
    pub(crate) fn record_spend(
        &mut self,
        id: GrantId,
        report: ReportId,
        amount: Amount,
        recorded_on: NaiveDate,
    ) -> Result<Amount> {
        self.check_spend(id, amount)?;
        let budget = self
            .budgets
            .get_mut(&id)
            .ok_or_else(|| RgmsError::NotFound(format!("budget of {id}")))?;
        budget.total_spent = budget.total_spent.checked_add(amount)?;
        budget.expenditures.push(ExpenditureEntry {
            report,
            amount,
            recorded_on,
        });
        Ok(budget.total_spent)
    }

    /// Raise a grant's allocation. Spend is untouched.
    pub(crate) fn add_capacity(&mut self, id: GrantId, amount: Amount) -> Result<Amount> {
        let grant = self
            .grants
            .get_mut(&id)
            .ok_or_else(|| RgmsError::not_found(id))?;
        grant.allocated = grant.allocated.checked_add(amount)?;
        Ok(grant.allocated)
    }

    pub fn overview(&self, id: GrantId) -> Result<GrantOverview> {
        let grant = self.grant(id).ok_or_else(|| RgmsError::not_found(id))?;
        let budget = self
            .budget(id)
            .ok_or_else(|| RgmsError::NotFound(format!("budget of {id}")))?;
        let usage = UsagePercent::of(budget.total_spent, grant.allocated);
        Ok(GrantOverview {
            grant: id,
            proposal: grant.proposal,
            allocated: grant.allocated,
            total_spent: budget.total_spent,
            remaining: grant.allocated.saturating_sub(budget.total_spent),
            usage,
            alert: usage.is_alert(),
            start: grant.start,
            end: grant.end,
            expenditure_count: budget.expenditures.len(),
        })
    }
}
