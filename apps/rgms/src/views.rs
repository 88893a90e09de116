//! # Views
//!
//! Read models shared by the CLI and the HTTP API.

use rgms_core::{
    ActorId, Evaluation, GrantOverview, Notification, ProgressReport, Proposal, ProposalId, Result,
    RgmsError, Role, Tracker, DASHBOARD_NOTIFICATION_LIMIT,
};
use serde::Serialize;

/// A researcher's landing page: the newest version of each proposal plus
/// the notification bell.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub researcher: ActorId,
    pub proposals: Vec<Proposal>,
    pub unread: usize,
    pub notifications: Vec<Notification>,
}

/// Everything known about one funded proposal.
#[derive(Debug, Clone, Serialize)]
pub struct GrantDetail {
    pub proposal: Proposal,
    pub overview: GrantOverview,
    pub evaluations: Vec<Evaluation>,
    pub reports: Vec<ProgressReport>,
}

pub fn dashboard(tracker: &Tracker, researcher: ActorId) -> Result<Dashboard> {
    tracker.actor(researcher)?.as_researcher()?;
    let inbox = tracker.inbox();
    Ok(Dashboard {
        researcher,
        proposals: tracker.dashboard(researcher).into_iter().cloned().collect(),
        unread: inbox.unread_count(researcher),
        notifications: inbox
            .latest(researcher, DASHBOARD_NOTIFICATION_LIMIT)
            .into_iter()
            .cloned()
            .collect(),
    })
}

/// The work queue of a reviewer or HOD.
pub fn queue(tracker: &Tracker, actor: ActorId) -> Result<Vec<Proposal>> {
    let actor = tracker.actor(actor)?;
    let proposals = match actor.role {
        Role::Reviewer => tracker.reviewer_queue(),
        Role::Hod => tracker.hod_queue(),
        Role::Researcher => {
            return Err(RgmsError::Unauthorized(format!(
                "{} is a researcher and has no review queue",
                actor.id
            )));
        }
    };
    Ok(proposals.into_iter().cloned().collect())
}

/// The grant opened for `proposal`.
pub fn grant_detail(tracker: &Tracker, proposal: ProposalId) -> Result<GrantDetail> {
    let p = tracker.proposal(proposal)?;
    let grant = tracker
        .ledger()
        .grant_for(proposal)
        .ok_or_else(|| RgmsError::NotFound(format!("grant of {proposal}")))?;
    Ok(GrantDetail {
        proposal: p.clone(),
        overview: tracker.grant_overview(grant.id)?,
        evaluations: tracker.evaluations_for(proposal).into_iter().cloned().collect(),
        reports: tracker.reports_for(proposal).into_iter().cloned().collect(),
    })
}

/// All notifications of an actor, newest first.
pub fn notifications(tracker: &Tracker, actor: ActorId) -> Result<Vec<Notification>> {
    tracker.actor(actor)?;
    Ok(tracker
        .inbox()
        .latest(actor, usize::MAX)
        .into_iter()
        .cloned()
        .collect())
}
