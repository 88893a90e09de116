//! # Dispatcher
//!
//! Routes a validated [`Command`] from an authenticated actor to the core
//! workflow that serves it. The actor's role is turned into the matching
//! capability handle here; a command the role cannot perform fails with
//! `Unauthorized` before the core is touched.

use chrono::NaiveDate;
use rgms_core::{
    ActorId, Amount, ApprovalReceipt, EvaluationId, GrantId, GrantTerms, ProjectHealth, ProposalId,
    ProposalStatus, ReportDraft, ReportId, ReportReceipt, Result, TopUpReceipt, Tracker, Version,
};
use serde::Serialize;
use tracing::debug;

/// A typed workflow request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SubmitProposal {
        title: String,
        requested: Amount,
        date: NaiveDate,
    },
    SaveDraft {
        title: String,
        requested: Amount,
        date: NaiveDate,
    },
    SubmitDraft {
        proposal: ProposalId,
    },
    Resubmit {
        proposal: ProposalId,
        requested: Option<Amount>,
        date: NaiveDate,
    },
    Evaluate {
        proposal: ProposalId,
        score: u8,
        comments: String,
    },
    Approve {
        proposal: ProposalId,
        terms: GrantTerms,
    },
    Reject {
        proposal: ProposalId,
        reason: String,
    },
    TopUp {
        grant: GrantId,
        amount: Amount,
    },
    SubmitReport {
        proposal: ProposalId,
        draft: ReportDraft,
        date: NaiveDate,
    },
    Intervene {
        proposal: ProposalId,
        feedback: String,
        health: ProjectHealth,
        date: NaiveDate,
    },
    MarkNotificationsRead,
}

/// What a command produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    ProposalCreated {
        proposal: ProposalId,
        version: Version,
        status: ProposalStatus,
    },
    DraftSubmitted {
        proposal: ProposalId,
    },
    Evaluated {
        evaluation: EvaluationId,
    },
    Approved(ApprovalReceipt),
    Rejected {
        proposal: ProposalId,
    },
    ToppedUp(TopUpReceipt),
    Reported(ReportReceipt),
    Intervened {
        report: ReportId,
        status: ProposalStatus,
    },
    NotificationsRead {
        count: usize,
    },
}

/// Executes commands against a tracker on behalf of registered actors.
pub struct Dispatcher<'a> {
    tracker: &'a mut Tracker,
}

impl<'a> Dispatcher<'a> {
    pub fn new(tracker: &'a mut Tracker) -> Self {
        Self { tracker }
    }

    /// Run `command` as `actor`.
    pub fn execute(&mut self, actor: ActorId, command: Command) -> Result<Outcome> {
        let actor = self.tracker.actor(actor)?.clone();
        debug!(actor = %actor.id, role = %actor.role, ?command, "dispatching");
        let t = &mut *self.tracker;

        Ok(match command {
            Command::SubmitProposal { title, requested, date } => {
                let id = t.submit_proposal(&actor.as_researcher()?, &title, requested, date)?;
                created(t, id)?
            }
            Command::SaveDraft { title, requested, date } => {
                let id = t.save_draft(&actor.as_researcher()?, &title, requested, date)?;
                created(t, id)?
            }
            Command::SubmitDraft { proposal } => {
                t.submit_draft(&actor.as_researcher()?, proposal)?;
                Outcome::DraftSubmitted { proposal }
            }
            Command::Resubmit { proposal, requested, date } => {
                let id = t.resubmit(&actor.as_researcher()?, proposal, requested, date)?;
                created(t, id)?
            }
            Command::Evaluate { proposal, score, comments } => Outcome::Evaluated {
                evaluation: t.evaluate(&actor.as_reviewer()?, proposal, score, &comments)?,
            },
            Command::Approve { proposal, terms } => {
                Outcome::Approved(t.approve(&actor.as_hod()?, proposal, terms)?)
            }
            Command::Reject { proposal, reason } => {
                t.reject(&actor.as_hod()?, proposal, &reason)?;
                Outcome::Rejected { proposal }
            }
            Command::TopUp { grant, amount } => {
                Outcome::ToppedUp(t.top_up(&actor.as_hod()?, grant, amount)?)
            }
            Command::SubmitReport { proposal, draft, date } => {
                Outcome::Reported(t.submit_report(&actor.as_researcher()?, proposal, draft, date)?)
            }
            Command::Intervene { proposal, feedback, health, date } => {
                let report =
                    t.record_intervention(&actor.as_hod()?, proposal, &feedback, health, date)?;
                Outcome::Intervened {
                    report,
                    status: t.proposal(proposal)?.status,
                }
            }
            Command::MarkNotificationsRead => Outcome::NotificationsRead {
                count: t.mark_notifications_read(actor.id)?,
            },
        })
    }
}

fn created(tracker: &Tracker, id: ProposalId) -> Result<Outcome> {
    let p = tracker.proposal(id)?;
    Ok(Outcome::ProposalCreated {
        proposal: id,
        version: p.version,
        status: p.status,
    })
}
