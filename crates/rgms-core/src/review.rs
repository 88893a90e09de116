//! # Review
//!
//! Reviewer evaluations. The first evaluation moves a proposal from
//! `Pending` to `ReviewComplete`; further reviewers may still add theirs
//! until the HOD decides. Each reviewer evaluates a proposal at most once.

use crate::actor::Evaluator;
use crate::approval::proposal_link;
use crate::error::{Result, RgmsError};
use crate::tracker::Tracker;
use crate::types::Evaluation;
use crate::{EvaluationId, ProposalId, ProposalStatus, MAX_SCORE, MIN_SCORE};
use tracing::debug;

impl Tracker {
    /// Record a reviewer's score and comments. Required role: Reviewer.
    pub fn evaluate(
        &mut self,
        reviewer: &impl Evaluator,
        proposal_id: ProposalId,
        score: u8,
        comments: &str,
    ) -> Result<EvaluationId> {
        let reviewer_id = reviewer.evaluator_id();
        if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
            return Err(RgmsError::InvalidInput(format!(
                "score {score} outside {MIN_SCORE}..={MAX_SCORE}"
            )));
        }
        let proposal = self.proposal(proposal_id)?;
        let next = match proposal.status {
            ProposalStatus::Pending => ProposalStatus::ReviewComplete,
            ProposalStatus::ReviewComplete => ProposalStatus::ReviewComplete,
            other => {
                return Err(RgmsError::IllegalStateTransition(format!(
                    "cannot evaluate a {other} proposal"
                )));
            }
        };
        let already = self
            .evaluations
            .values()
            .any(|e| e.proposal == proposal_id && e.reviewer == reviewer_id);
        if already {
            return Err(RgmsError::DuplicateEvaluation {
                reviewer: reviewer_id,
                proposal: proposal_id,
            });
        }
        let researcher = proposal.researcher;
        let title = proposal.title.clone();

        let id = EvaluationId(self.next_evaluation);
        self.next_evaluation = self.next_evaluation.saturating_add(1);
        self.evaluations.insert(
            id,
            Evaluation {
                id,
                proposal: proposal_id,
                reviewer: reviewer_id,
                score,
                comments: comments.trim().to_string(),
            },
        );
        self.proposal_mut(proposal_id)?.status = next;
        self.touch();
        debug!(evaluation = %id, proposal = %proposal_id, score, "evaluation recorded");

        self.notify(
            researcher,
            &format!("Your proposal '{title}' has been reviewed."),
            &proposal_link(proposal_id),
        );
        Ok(id)
    }

    /// Evaluations of a proposal, in submission order.
    #[must_use]
    pub fn evaluations_for(&self, proposal: ProposalId) -> Vec<&Evaluation> {
        self.evaluations
            .values()
            .filter(|e| e.proposal == proposal)
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::actor::{Actor, Role};
    use crate::Amount;
    use chrono::NaiveDate;

    fn setup() -> (Tracker, crate::ResearcherHandle, crate::ReviewerHandle, ProposalId) {
        let mut tracker = Tracker::new();
        let r = tracker.register_actor("ria", Role::Researcher, "bio").unwrap();
        let v = tracker.register_actor("vic", Role::Reviewer, "bio").unwrap();
        let researcher = tracker.actor(r).and_then(Actor::as_researcher).unwrap();
        let reviewer = tracker.actor(v).and_then(Actor::as_reviewer).unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let id = tracker
            .submit_proposal(&researcher, "A", Amount::from_units(10), day)
            .unwrap();
        (tracker, researcher, reviewer, id)
    }

    #[test]
    fn first_evaluation_completes_review() {
        let (mut tracker, _, reviewer, id) = setup();
        tracker.evaluate(&reviewer, id, 7, "fine").unwrap();
        assert_eq!(tracker.proposal(id).unwrap().status, ProposalStatus::ReviewComplete);
        assert_eq!(tracker.hod_queue().len(), 1);
        assert_eq!(tracker.evaluations_for(id).len(), 1);
    }

    #[test]
    fn same_reviewer_cannot_evaluate_twice() {
        let (mut tracker, _, reviewer, id) = setup();
        tracker.evaluate(&reviewer, id, 7, "fine").unwrap();
        let err = tracker.evaluate(&reviewer, id, 9, "changed mind").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::DuplicateEvaluation);
        assert_eq!(tracker.evaluations_for(id).len(), 1);
    }

    #[test]
    fn second_reviewer_may_add_an_evaluation() {
        let (mut tracker, _, reviewer, id) = setup();
        tracker.evaluate(&reviewer, id, 7, "fine").unwrap();
        let w = tracker.register_actor("wen", Role::Reviewer, "bio").unwrap();
        let second = tracker.actor(w).and_then(Actor::as_reviewer).unwrap();
        assert!(tracker.evaluate(&second, id, 5, "meh").is_ok());
        assert_eq!(tracker.evaluations_for(id).len(), 2);
    }

    #[test]
    fn score_must_be_in_range() {
        let (mut tracker, _, reviewer, id) = setup();
        assert!(tracker.evaluate(&reviewer, id, 0, "").is_err());
        assert!(tracker.evaluate(&reviewer, id, MAX_SCORE + 1, "").is_err());
        assert_eq!(tracker.proposal(id).unwrap().status, ProposalStatus::Pending);
    }

    #[test]
    fn drafts_cannot_be_evaluated() {
        let (mut tracker, researcher, reviewer, _) = setup();
        let day = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let draft = tracker
            .save_draft(&researcher, "D", Amount::from_units(1), day)
            .unwrap();
        let err = tracker.evaluate(&reviewer, draft, 5, "").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::IllegalStateTransition);
    }
}
