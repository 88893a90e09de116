//! # rgms-core
//!
//! THE LOGIC of the research grant management system.
//!
//! Pure, deterministic grant lifecycle state: proposals and their version
//! chains, reviewer evaluations, HOD approval against department funds,
//! per-grant budgets, progress reports and interventions.
//!
//! ## Ground rules
//!
//! - No async, no network, no wall clock. Dates are passed in.
//! - `BTreeMap` only, so listings and snapshots are deterministic.
//! - No binary floating point: money, versions and percentages are
//!   fixed-point integers (see [`Amount`], [`Version`], [`UsagePercent`]).
//! - Every operation validates before it mutates. An `Err` means nothing
//!   changed.
//!
//! ## Capabilities
//!
//! Workflow operations take a role capability ([`Submitter`], [`Evaluator`],
//! [`Approver`]) that can only be obtained from an [`Actor`] of the matching
//! role, so the required role is checked once, at the edge.

// =============================================================================
// MODULES
// =============================================================================

pub mod actor;
pub mod analytics;
pub mod approval;
pub mod department;
pub mod error;
pub mod formats;
pub mod ledger;
pub mod notify;
pub mod primitives;
pub mod progress;
pub mod review;
pub mod status;
pub mod storage;
pub mod tracker;
pub mod types;
pub mod version_chain;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use actor::{
    Actor, Approver, Evaluator, HodHandle, ResearcherHandle, ReviewerHandle, Role, Submitter,
};
pub use analytics::DepartmentSummary;
pub use approval::{ApprovalReceipt, TopUpReceipt};
pub use department::DepartmentBudget;
pub use error::{ErrorKind, Result, RgmsError};
pub use formats::{decode_snapshot, encode_snapshot, load_tracker, save_tracker};
pub use ledger::{Budget, ExpenditureEntry, Grant, GrantOverview, GrantTerms, Ledger};
pub use notify::{Inbox, Notification, NotificationSink, NotifyError};
pub use primitives::{
    ActorId, Amount, EvaluationId, GrantId, NotificationId, ProposalId, ReportId, UsagePercent,
    Version, DASHBOARD_NOTIFICATION_LIMIT, DEFAULT_DEPARTMENT_BUDGET, MAX_SCORE, MAX_TITLE_LEN,
    MIN_SCORE, USAGE_ALERT_THRESHOLD,
};
pub use progress::{ExpenditureOutcome, ReportDraft, ReportReceipt};
pub use status::{ProjectHealth, ProposalStatus};
pub use storage::RedbStore;
pub use tracker::{Counters, Tracker, TrackerSnapshot};
pub use types::{Evaluation, ProgressReport, Proposal, ReportKind};
