//! # Department Analytics
//!
//! Read-only rollup of an HOD's department: remaining funds, grant totals,
//! and which grants are close to exhausting their allocation.

use crate::error::Result;
use crate::ledger::GrantOverview;
use crate::tracker::Tracker;
use crate::{ActorId, Amount, GrantId, ProposalStatus, UsagePercent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of a department's funding position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentSummary {
    pub hod: ActorId,
    pub department: String,
    pub available: Amount,
    pub grant_count: usize,
    pub total_allocated: Amount,
    pub total_spent: Amount,
    pub total_remaining: Amount,
    pub usage: UsagePercent,
    /// Proposal counts across the whole tracker, by status.
    pub proposals_by_status: BTreeMap<ProposalStatus, usize>,
    /// Grants above the usage alert threshold.
    pub alerts: Vec<GrantOverview>,
}

impl Tracker {
    /// Allocation, spend and alert state of one grant.
    pub fn grant_overview(&self, grant: GrantId) -> Result<GrantOverview> {
        self.ledger.overview(grant)
    }

    /// Summarise the department of `hod`.
    pub fn department_summary(&self, hod: ActorId) -> Result<DepartmentSummary> {
        let actor = self.actor(hod)?;
        let available = self.department(hod)?.available();
        let grants = self.active_grants(hod);

        let mut total_allocated = Amount::ZERO;
        let mut total_spent = Amount::ZERO;
        for g in &grants {
            total_allocated = total_allocated.checked_add(g.allocated)?;
            total_spent = total_spent.checked_add(g.total_spent)?;
        }

        let mut proposals_by_status = BTreeMap::new();
        for p in self.proposals() {
            *proposals_by_status.entry(p.status).or_insert(0usize) += 1;
        }

        let alerts: Vec<_> = grants.iter().filter(|g| g.alert).cloned().collect();

        Ok(DepartmentSummary {
            hod,
            department: actor.department.clone(),
            available,
            grant_count: grants.len(),
            total_allocated,
            total_spent,
            total_remaining: total_allocated.saturating_sub(total_spent),
            usage: UsagePercent::of(total_spent, total_allocated),
            proposals_by_status,
            alerts,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::actor::{Actor, Role};
    use crate::ledger::GrantTerms;
    use crate::ReportDraft;
    use chrono::NaiveDate;

    #[test]
    fn summary_totals_grants_and_flags_alerts() {
        let day = |d| NaiveDate::from_ymd_opt(2025, 1, d).unwrap();
        let mut t = Tracker::with_opening_budget(Amount::from_units(10_000));
        let r = t.register_actor("ria", Role::Researcher, "bio").unwrap();
        let v = t.register_actor("vic", Role::Reviewer, "bio").unwrap();
        let h = t.register_actor("hal", Role::Hod, "bio").unwrap();
        let researcher = t.actor(r).and_then(Actor::as_researcher).unwrap();
        let reviewer = t.actor(v).and_then(Actor::as_reviewer).unwrap();
        let hod = t.actor(h).and_then(Actor::as_hod).unwrap();

        let mut grants = Vec::new();
        for title in ["A", "B"] {
            let id = t
                .submit_proposal(&researcher, title, Amount::from_units(1000), day(1))
                .unwrap();
            t.evaluate(&reviewer, id, 6, "").unwrap();
            let terms = GrantTerms {
                allocated: Amount::from_units(1000),
                start: day(2),
                end: day(30),
            };
            t.approve(&hod, id, terms).unwrap();
            grants.push(id);
        }
        t.submit_report(&researcher, grants[0], ReportDraft::new("x", "", Amount::from_units(950)), day(3))
            .unwrap();
        t.submit_proposal(&researcher, "C", Amount::from_units(1), day(4))
            .unwrap();

        let summary = t.department_summary(h).unwrap();
        assert_eq!(summary.available, Amount::from_units(8000));
        assert_eq!(summary.grant_count, 2);
        assert_eq!(summary.total_allocated, Amount::from_units(2000));
        assert_eq!(summary.total_spent, Amount::from_units(950));
        assert_eq!(summary.total_remaining, Amount::from_units(1050));
        assert_eq!(summary.usage.to_string(), "47.5");
        assert_eq!(summary.alerts.len(), 1);
        assert_eq!(summary.proposals_by_status.get(&ProposalStatus::Approved), Some(&2));
        assert_eq!(summary.proposals_by_status.get(&ProposalStatus::Pending), Some(&1));
    }

    #[test]
    fn summary_requires_an_hod() {
        let mut t = Tracker::new();
        let r = t.register_actor("ria", Role::Researcher, "bio").unwrap();
        assert!(t.department_summary(r).is_err());
    }
}
