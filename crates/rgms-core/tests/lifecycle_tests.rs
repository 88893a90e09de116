//! End-to-end grant lifecycle scenarios against the public core API.

#![allow(clippy::unwrap_used, clippy::panic)]

use chrono::NaiveDate;
use rgms_core::{
    Actor, Amount, ErrorKind, ExpenditureOutcome, GrantTerms, HodHandle, ProjectHealth,
    ProposalStatus, ReportDraft, ResearcherHandle, ReviewerHandle, Role, Tracker, Version,
};

struct World {
    tracker: Tracker,
    researcher: ResearcherHandle,
    reviewer: ReviewerHandle,
    hod: HodHandle,
}

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, m, d).unwrap()
}

fn amount(s: &str) -> Amount {
    s.parse().unwrap()
}

fn world(department_budget: &str) -> World {
    let mut tracker = Tracker::with_opening_budget(amount(department_budget));
    let r = tracker.register_actor("Rosa", Role::Researcher, "Physics").unwrap();
    let v = tracker.register_actor("Victor", Role::Reviewer, "Physics").unwrap();
    let h = tracker.register_actor("Helena", Role::Hod, "Physics").unwrap();
    World {
        researcher: tracker.actor(r).and_then(Actor::as_researcher).unwrap(),
        reviewer: tracker.actor(v).and_then(Actor::as_reviewer).unwrap(),
        hod: tracker.actor(h).and_then(Actor::as_hod).unwrap(),
        tracker,
    }
}

fn terms(allocated: &str) -> GrantTerms {
    GrantTerms {
        allocated: amount(allocated),
        start: date(2, 1),
        end: date(12, 31),
    }
}

#[test]
fn test_fund_report_and_top_up() {
    let mut w = world("50000");
    let hod_id = rgms_core::Approver::approver_id(&w.hod);

    let id = w
        .tracker
        .submit_proposal(&w.researcher, "Proposal A", amount("10000"), date(1, 10))
        .unwrap();
    assert_eq!(w.tracker.proposal(id).unwrap().version, Version::INITIAL);
    w.tracker.evaluate(&w.reviewer, id, 8, "fund it").unwrap();

    let receipt = w.tracker.approve(&w.hod, id, terms("8000")).unwrap();
    assert_eq!(w.tracker.department(hod_id).unwrap().available(), amount("42000"));
    let overview = w.tracker.grant_overview(receipt.grant).unwrap();
    assert_eq!(overview.allocated, amount("8000"));
    assert_eq!(overview.total_spent, Amount::ZERO);
    assert_eq!(w.tracker.proposal(id).unwrap().status, ProposalStatus::Approved);

    let report = w
        .tracker
        .submit_report(
            &w.researcher,
            id,
            ReportDraft::new("first quarter", "rig built", amount("2000")),
            date(3, 1),
        )
        .unwrap();
    assert!(matches!(report.expenditure, ExpenditureOutcome::Recorded { .. }));
    let overview = w.tracker.grant_overview(receipt.grant).unwrap();
    assert_eq!(overview.total_spent, amount("2000"));
    assert_eq!(overview.usage.to_string(), "25.0");

    let top_up = w.tracker.top_up(&w.hod, receipt.grant, amount("4000")).unwrap();
    assert_eq!(top_up.allocated, amount("12000"));
    assert_eq!(w.tracker.department(hod_id).unwrap().available(), amount("38000"));
    assert_eq!(top_up.usage.to_string(), "16.7");
}

#[test]
fn test_overdrawn_approval_changes_nothing() {
    let mut w = world("50000");
    let hod_id = rgms_core::Approver::approver_id(&w.hod);
    let id = w
        .tracker
        .submit_proposal(&w.researcher, "Proposal B", amount("60000"), date(1, 10))
        .unwrap();
    w.tracker.evaluate(&w.reviewer, id, 6, "").unwrap();
    let before = w.tracker.revision();

    let err = w.tracker.approve(&w.hod, id, terms("60000")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    assert_eq!(w.tracker.department(hod_id).unwrap().available(), amount("50000"));
    assert_eq!(w.tracker.proposal(id).unwrap().status, ProposalStatus::ReviewComplete);
    assert!(w.tracker.ledger().grant_for(id).is_none());
    assert_eq!(w.tracker.revision(), before);
}

#[test]
fn test_resubmission_chain_and_dashboard() {
    let mut w = world("50000");
    let researcher_id = rgms_core::Submitter::submitter_id(&w.researcher);
    let first = w
        .tracker
        .submit_proposal(&w.researcher, "Proposal C", amount("500"), date(1, 1))
        .unwrap();
    w.tracker.reject(&w.hod, first, "too vague").unwrap();
    let second = w.tracker.resubmit(&w.researcher, first, None, date(1, 5)).unwrap();
    let third = w
        .tracker
        .resubmit(&w.researcher, second, Some(amount("750")), date(1, 9))
        .unwrap();
    let other = w
        .tracker
        .submit_proposal(&w.researcher, "Proposal D", amount("10"), date(1, 7))
        .unwrap();

    assert_eq!(w.tracker.proposal(third).unwrap().version.to_string(), "1.2");
    let dashboard: Vec<_> = w.tracker.dashboard(researcher_id).iter().map(|p| p.id).collect();
    assert_eq!(dashboard, vec![third, other]);
}

#[test]
fn test_intervention_flags_the_project() {
    let mut w = world("50000");
    let id = w
        .tracker
        .submit_proposal(&w.researcher, "Proposal E", amount("1000"), date(1, 1))
        .unwrap();
    w.tracker.evaluate(&w.reviewer, id, 4, "risky").unwrap();
    w.tracker.approve(&w.hod, id, terms("1000")).unwrap();

    w.tracker
        .record_intervention(&w.hod, id, "no progress in months", ProjectHealth::NeedsIntervention, date(6, 1))
        .unwrap();
    assert_eq!(w.tracker.proposal(id).unwrap().status, ProposalStatus::NeedsIntervention);

    // the project can still report while flagged
    let receipt = w
        .tracker
        .submit_report(&w.researcher, id, ReportDraft::new("catching up", "", amount("100")), date(6, 15))
        .unwrap();
    assert!(!receipt.alert);
    assert_eq!(w.tracker.reports_for(id).len(), 2);
}

#[test]
fn test_wrong_role_cannot_obtain_a_capability() {
    let w = world("50000");
    let researcher = w
        .tracker
        .actors()
        .find(|a| a.role == Role::Researcher)
        .unwrap();
    let err = researcher.as_hod().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}
