//! # Tracker
//!
//! The single owner of all grant lifecycle state. Workflow operations are
//! split across modules as further `impl Tracker` blocks:
//!
//! - [`crate::approval`]: approve, reject, top-up
//! - [`crate::progress`]: progress reports and HOD interventions
//! - [`crate::review`]: reviewer evaluations
//! - [`crate::analytics`]: department summaries
//!
//! Every mutating operation validates everything first and only then
//! applies its changes, bumping [`Tracker::revision`] once per call.

use crate::actor::{Actor, Role, Submitter};
use crate::department::DepartmentBudget;
use crate::error::{Result, RgmsError};
use crate::ledger::{Budget, Grant, GrantOverview, Ledger};
use crate::notify::{Inbox, Notification, NotificationSink};
use crate::types::{Evaluation, ProgressReport, Proposal};
use crate::version_chain;
use crate::{
    ActorId, Amount, EvaluationId, ProposalId, ProposalStatus, ReportId,
    DEFAULT_DEPARTMENT_BUDGET, MAX_TITLE_LEN,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Id counters carried across persistence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub next_actor: u64,
    pub next_proposal: u64,
    pub next_evaluation: u64,
    pub next_report: u64,
    pub next_grant: u64,
    pub next_notification: u64,
}

/// Flat, serializable form of the whole tracker state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub revision: u64,
    pub opening_budget: Amount,
    pub counters: Counters,
    pub actors: Vec<Actor>,
    pub proposals: Vec<Proposal>,
    pub evaluations: Vec<Evaluation>,
    pub reports: Vec<ProgressReport>,
    pub grants: Vec<Grant>,
    pub budgets: Vec<Budget>,
    pub departments: Vec<DepartmentBudget>,
    pub notifications: Vec<Notification>,
}

// =============================================================================
// TRACKER
// =============================================================================

/// Grant lifecycle state and the operations over it.
pub struct Tracker {
    pub(crate) actors: BTreeMap<ActorId, Actor>,
    pub(crate) proposals: BTreeMap<ProposalId, Proposal>,
    pub(crate) evaluations: BTreeMap<EvaluationId, Evaluation>,
    pub(crate) reports: BTreeMap<ReportId, ProgressReport>,
    pub(crate) ledger: Ledger,
    pub(crate) departments: BTreeMap<ActorId, DepartmentBudget>,
    pub(crate) inbox: Inbox,
    next_actor: u64,
    next_proposal: u64,
    pub(crate) next_evaluation: u64,
    pub(crate) next_report: u64,
    opening_budget: Amount,
    revision: u64,
    relays: Vec<Box<dyn NotificationSink + Send>>,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::with_opening_budget(DEFAULT_DEPARTMENT_BUDGET)
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("revision", &self.revision)
            .field("actors", &self.actors.len())
            .field("proposals", &self.proposals.len())
            .field("grants", &self.ledger.grants().count())
            .field("relays", &self.relays.len())
            .finish_non_exhaustive()
    }
}

impl Tracker {
    /// Create an empty tracker with the default opening department budget.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty tracker whose HODs open with `opening_budget`.
    #[must_use]
    pub fn with_opening_budget(opening_budget: Amount) -> Self {
        Self {
            actors: BTreeMap::new(),
            proposals: BTreeMap::new(),
            evaluations: BTreeMap::new(),
            reports: BTreeMap::new(),
            ledger: Ledger::new(),
            departments: BTreeMap::new(),
            inbox: Inbox::new(),
            next_actor: 0,
            next_proposal: 0,
            next_evaluation: 0,
            next_report: 0,
            opening_budget,
            revision: 0,
            relays: Vec::new(),
        }
    }

    /// Opening funds for HODs registered from now on.
    #[must_use]
    pub fn opening_budget(&self) -> Amount {
        self.opening_budget
    }

    /// Forward every notification to an additional sink.
    pub fn add_relay(&mut self, sink: Box<dyn NotificationSink + Send>) {
        self.relays.push(sink);
    }

    /// Number of successful mutations applied so far.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn touch(&mut self) {
        self.revision = self.revision.saturating_add(1);
    }

    /// Store a notification and forward it to every relay.
    ///
    /// Relay failures are logged and otherwise ignored.
    pub(crate) fn notify(&mut self, recipient: ActorId, message: &str, link: &str) {
        self.inbox.push(recipient, message, link);
        for relay in &mut self.relays {
            if let Err(err) = relay.notify(recipient, message, link) {
                warn!(%recipient, %err, "notification relay failed");
            }
        }
    }

    // =========================================================================
    // ACTORS
    // =========================================================================

    /// Register an actor. HODs also get a department budget.
    pub fn register_actor(&mut self, name: &str, role: Role, department: &str) -> Result<ActorId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RgmsError::InvalidInput("actor name cannot be empty".into()));
        }
        let id = ActorId(self.next_actor);
        self.next_actor = self.next_actor.saturating_add(1);
        self.actors.insert(
            id,
            Actor {
                id,
                name: name.to_string(),
                role,
                department: department.trim().to_string(),
            },
        );
        if role == Role::Hod {
            self.departments
                .insert(id, DepartmentBudget::new(id, self.opening_budget));
        }
        self.touch();
        debug!(%id, %role, "registered actor");
        Ok(id)
    }

    pub fn actor(&self, id: ActorId) -> Result<&Actor> {
        self.actors.get(&id).ok_or_else(|| RgmsError::not_found(id))
    }

    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    pub fn department(&self, hod: ActorId) -> Result<&DepartmentBudget> {
        self.departments
            .get(&hod)
            .ok_or_else(|| RgmsError::NotFound(format!("department budget of {hod}")))
    }

    // =========================================================================
    // PROPOSALS
    // =========================================================================

    pub fn proposal(&self, id: ProposalId) -> Result<&Proposal> {
        self.proposals.get(&id).ok_or_else(|| RgmsError::not_found(id))
    }

    pub fn proposals(&self) -> impl Iterator<Item = &Proposal> {
        self.proposals.values()
    }

    pub(crate) fn proposal_mut(&mut self, id: ProposalId) -> Result<&mut Proposal> {
        self.proposals
            .get_mut(&id)
            .ok_or_else(|| RgmsError::not_found(id))
    }

    /// Fetch a proposal and check that `researcher` owns it.
    pub(crate) fn owned_proposal(&self, researcher: ActorId, id: ProposalId) -> Result<&Proposal> {
        let proposal = self.proposal(id)?;
        if proposal.researcher != researcher {
            return Err(RgmsError::Unauthorized(format!(
                "{id} belongs to {}, not {researcher}",
                proposal.researcher
            )));
        }
        Ok(proposal)
    }

    /// Create a proposal in `Draft`.
    pub fn save_draft(
        &mut self,
        researcher: &impl Submitter,
        title: &str,
        requested: Amount,
        submitted_on: NaiveDate,
    ) -> Result<ProposalId> {
        self.create_proposal(
            researcher.submitter_id(),
            title,
            requested,
            ProposalStatus::Draft,
            submitted_on,
        )
    }

    /// Create a proposal in `Pending`, ready for review.
    pub fn submit_proposal(
        &mut self,
        researcher: &impl Submitter,
        title: &str,
        requested: Amount,
        submitted_on: NaiveDate,
    ) -> Result<ProposalId> {
        self.create_proposal(
            researcher.submitter_id(),
            title,
            requested,
            ProposalStatus::Pending,
            submitted_on,
        )
    }

    /// Move an owned draft to `Pending`.
    pub fn submit_draft(&mut self, researcher: &impl Submitter, id: ProposalId) -> Result<()> {
        let next = self
            .owned_proposal(researcher.submitter_id(), id)?
            .status
            .transition(ProposalStatus::Pending)?;
        self.proposal_mut(id)?.status = next;
        self.touch();
        debug!(%id, "draft submitted");
        Ok(())
    }

    /// Submit the next version of an owned proposal's chain.
    ///
    /// Keeps the title; `requested` defaults to the previous request.
    /// A chain that already holds a grant cannot be resubmitted.
    pub fn resubmit(
        &mut self,
        researcher: &impl Submitter,
        id: ProposalId,
        requested: Option<Amount>,
        submitted_on: NaiveDate,
    ) -> Result<ProposalId> {
        let owner = researcher.submitter_id();
        let previous = self.owned_proposal(owner, id)?;
        let title = previous.title.clone();
        let requested = requested.unwrap_or(previous.requested);
        let funded = version_chain::chain(self.proposals.values(), owner, &title)
            .iter()
            .any(|p| p.status.is_funded());
        if funded {
            return Err(RgmsError::IllegalStateTransition(format!(
                "'{title}' is already funded and cannot be resubmitted"
            )));
        }
        self.create_proposal(
            owner,
            &title,
            requested,
            ProposalStatus::Pending,
            submitted_on,
        )
    }

    fn create_proposal(
        &mut self,
        researcher: ActorId,
        title: &str,
        requested: Amount,
        status: ProposalStatus,
        submitted_on: NaiveDate,
    ) -> Result<ProposalId> {
        let title = title.trim();
        if title.is_empty() {
            return Err(RgmsError::InvalidInput("title cannot be empty".into()));
        }
        if title.len() > MAX_TITLE_LEN {
            return Err(RgmsError::InvalidInput(format!(
                "title is {} bytes, limit is {MAX_TITLE_LEN}",
                title.len()
            )));
        }
        if requested.is_negative() {
            return Err(RgmsError::InvalidInput(format!(
                "requested amount cannot be negative, got {requested}"
            )));
        }

        let version = version_chain::next_version(self.proposals.values(), researcher, title);
        let id = ProposalId(self.next_proposal);
        self.next_proposal = self.next_proposal.saturating_add(1);
        self.proposals.insert(
            id,
            Proposal {
                id,
                researcher,
                title: title.to_string(),
                requested,
                status,
                version,
                submitted_on,
            },
        );
        self.touch();
        debug!(%id, %researcher, %version, %status, "proposal created");
        Ok(id)
    }

    // =========================================================================
    // LISTINGS
    // =========================================================================

    /// Newest version of each of a researcher's titles, newest first.
    #[must_use]
    pub fn dashboard(&self, researcher: ActorId) -> Vec<&Proposal> {
        version_chain::dashboard(self.proposals.values(), researcher)
    }

    /// Every submitted (non-draft) proposal, newest first.
    #[must_use]
    pub fn reviewer_queue(&self) -> Vec<&Proposal> {
        let mut rows: Vec<_> = self
            .proposals
            .values()
            .filter(|p| p.status != ProposalStatus::Draft)
            .collect();
        rows.sort_by_key(|p| Reverse((p.submitted_on, p.id)));
        rows
    }

    /// Proposals waiting for an HOD decision.
    #[must_use]
    pub fn hod_queue(&self) -> Vec<&Proposal> {
        self.proposals
            .values()
            .filter(|p| p.status == ProposalStatus::ReviewComplete)
            .collect()
    }

    /// Overviews of every grant funded by `hod`.
    #[must_use]
    pub fn active_grants(&self, hod: ActorId) -> Vec<GrantOverview> {
        self.ledger
            .grants()
            .filter(|g| g.approved_by == hod)
            .filter_map(|g| self.ledger.overview(g.id).ok())
            .collect()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Progress log of a proposal, oldest first.
    #[must_use]
    pub fn reports_for(&self, proposal: ProposalId) -> Vec<&ProgressReport> {
        self.reports
            .values()
            .filter(|r| r.proposal == proposal)
            .collect()
    }

    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    /// Mark all of an actor's notifications read.
    pub fn mark_notifications_read(&mut self, actor: ActorId) -> Result<usize> {
        self.actor(actor)?;
        let changed = self.inbox.mark_all_read(actor);
        if changed > 0 {
            self.touch();
        }
        Ok(changed)
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Flatten the state for persistence.
    #[must_use]
    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            revision: self.revision,
            opening_budget: self.opening_budget,
            counters: Counters {
                next_actor: self.next_actor,
                next_proposal: self.next_proposal,
                next_evaluation: self.next_evaluation,
                next_report: self.next_report,
                next_grant: self.ledger.next_grant_id(),
                next_notification: self.inbox.next_id(),
            },
            actors: self.actors.values().cloned().collect(),
            proposals: self.proposals.values().cloned().collect(),
            evaluations: self.evaluations.values().cloned().collect(),
            reports: self.reports.values().cloned().collect(),
            grants: self.ledger.grants().cloned().collect(),
            budgets: self.ledger.budgets().cloned().collect(),
            departments: self.departments.values().cloned().collect(),
            notifications: self.inbox.all().cloned().collect(),
        }
    }

    /// Rebuild a tracker from a snapshot. Relays are not persisted.
    pub fn from_snapshot(snapshot: TrackerSnapshot) -> Result<Self> {
        let TrackerSnapshot {
            revision,
            opening_budget,
            counters,
            actors,
            proposals,
            evaluations,
            reports,
            grants,
            budgets,
            departments,
            notifications,
        } = snapshot;

        let mut tracker = Self::with_opening_budget(opening_budget);
        tracker.revision = revision;
        tracker.next_actor = counters.next_actor;
        tracker.next_proposal = counters.next_proposal;
        tracker.next_evaluation = counters.next_evaluation;
        tracker.next_report = counters.next_report;

        for a in actors {
            tracker.next_actor = tracker.next_actor.max(a.id.0.saturating_add(1));
            tracker.actors.insert(a.id, a);
        }
        for p in proposals {
            if !tracker.actors.contains_key(&p.researcher) {
                return Err(RgmsError::persistence(format!(
                    "{} owned by unknown {}",
                    p.id, p.researcher
                )));
            }
            tracker.next_proposal = tracker.next_proposal.max(p.id.0.saturating_add(1));
            tracker.proposals.insert(p.id, p);
        }
        for e in evaluations {
            tracker.next_evaluation = tracker.next_evaluation.max(e.id.0.saturating_add(1));
            tracker.evaluations.insert(e.id, e);
        }
        for r in reports {
            tracker.next_report = tracker.next_report.max(r.id.0.saturating_add(1));
            tracker.reports.insert(r.id, r);
        }
        for d in departments {
            tracker.departments.insert(d.hod, d);
        }
        tracker.ledger = Ledger::from_rows(grants, budgets, counters.next_grant)?;
        tracker.inbox = Inbox::from_rows(notifications, counters.next_notification);
        Ok(tracker)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::actor::ResearcherHandle;
    use crate::notify::NotifyError;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap_or_default()
    }

    fn researcher(tracker: &mut Tracker, name: &str) -> ResearcherHandle {
        let id = tracker
            .register_actor(name, Role::Researcher, "physics")
            .unwrap();
        tracker.actor(id).and_then(Actor::as_researcher).unwrap()
    }

    #[test]
    fn hod_registration_opens_department_budget() {
        let mut tracker = Tracker::with_opening_budget(Amount::from_units(50_000));
        let hod = tracker.register_actor("hana", Role::Hod, "physics");
        let hod = hod.unwrap_or(ActorId(u64::MAX));
        assert_eq!(
            tracker.department(hod).map(|d| d.available()).ok(),
            Some(Amount::from_units(50_000))
        );
        let reviewer = tracker
            .register_actor("rui", Role::Reviewer, "physics")
            .unwrap_or(ActorId(u64::MAX));
        assert!(tracker.department(reviewer).is_err());
    }

    #[test]
    fn resubmission_extends_the_chain() {
        let mut tracker = Tracker::new();
        let r = researcher(&mut tracker, "ria");
        let first = tracker
            .submit_proposal(&r, "Proposal A", Amount::from_units(10_000), day(1))
            .unwrap_or(ProposalId(u64::MAX));
        let second = tracker
            .resubmit(&r, first, None, day(2))
            .unwrap_or(ProposalId(u64::MAX));
        let versions: Vec<_> = [first, second]
            .iter()
            .filter_map(|id| tracker.proposal(*id).ok())
            .map(|p| p.version.to_string())
            .collect();
        assert_eq!(versions, vec!["1.0", "1.1"]);
        assert_eq!(tracker.dashboard(r.submitter_id()).len(), 1);
    }

    #[test]
    fn only_owner_may_resubmit() {
        let mut tracker = Tracker::new();
        let owner = researcher(&mut tracker, "ria");
        let other = researcher(&mut tracker, "olu");
        let id = tracker
            .submit_proposal(&owner, "A", Amount::from_units(1), day(1))
            .unwrap_or(ProposalId(u64::MAX));
        let err = tracker.resubmit(&other, id, None, day(2));
        assert!(matches!(err, Err(RgmsError::Unauthorized(_))));
    }

    #[test]
    fn invalid_titles_and_amounts_are_rejected() {
        let mut tracker = Tracker::new();
        let r = researcher(&mut tracker, "ria");
        let before = tracker.revision();
        assert!(tracker.submit_proposal(&r, "   ", Amount::ZERO, day(1)).is_err());
        let long = "x".repeat(MAX_TITLE_LEN + 1);
        assert!(tracker.submit_proposal(&r, &long, Amount::ZERO, day(1)).is_err());
        assert!(tracker
            .submit_proposal(&r, "ok", Amount::from_cents(-1), day(1))
            .is_err());
        assert_eq!(tracker.revision(), before);
        assert_eq!(tracker.proposals().count(), 0);
    }

    #[test]
    fn drafts_are_hidden_from_reviewers_until_submitted() {
        let mut tracker = Tracker::new();
        let r = researcher(&mut tracker, "ria");
        let id = tracker
            .save_draft(&r, "A", Amount::from_units(5), day(1))
            .unwrap_or(ProposalId(u64::MAX));
        assert!(tracker.reviewer_queue().is_empty());
        assert!(tracker.submit_draft(&r, id).is_ok());
        assert_eq!(tracker.reviewer_queue().len(), 1);
        assert!(tracker.submit_draft(&r, id).is_err());
    }

    struct Unreachable;

    impl NotificationSink for Unreachable {
        fn notify(&mut self, _: ActorId, _: &str, _: &str) -> std::result::Result<(), NotifyError> {
            Err(NotifyError("mail relay down".into()))
        }
    }

    #[test]
    fn failing_relay_does_not_undo_the_workflow() {
        let mut tracker = Tracker::new();
        tracker.add_relay(Box::new(Unreachable));
        let r = researcher(&mut tracker, "ria");
        let reviewer = tracker
            .register_actor("rui", Role::Reviewer, "physics")
            .unwrap();
        let reviewer = tracker.actor(reviewer).and_then(Actor::as_reviewer).unwrap();
        let id = tracker
            .submit_proposal(&r, "A", Amount::from_units(5), day(1))
            .unwrap();
        assert!(tracker.evaluate(&reviewer, id, 7, "fine").is_ok());
        assert_eq!(tracker.proposal(id).unwrap().status, ProposalStatus::ReviewComplete);
        assert_eq!(tracker.inbox().unread_count(r.submitter_id()), 1);
    }

    #[test]
    fn snapshot_roundtrip_preserves_counters() {
        let mut tracker = Tracker::new();
        let r = researcher(&mut tracker, "ria");
        let _ = tracker.submit_proposal(&r, "A", Amount::from_units(5), day(1));
        let snapshot = tracker.snapshot();
        let mut restored = Tracker::from_snapshot(snapshot.clone()).unwrap_or_default();
        assert_eq!(restored.snapshot(), snapshot);
        let next = restored.submit_proposal(&r, "B", Amount::from_units(5), day(2));
        assert_eq!(next.ok(), Some(ProposalId(1)));
    }
}
