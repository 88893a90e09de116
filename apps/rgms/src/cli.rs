//! # CLI Commands
//!
//! One function per subcommand. Each opens the configured store, loads the
//! tracker, runs the operation and, for mutations, saves with the revision
//! it loaded at.

use crate::config::Backend;
use crate::dispatch::{Dispatcher, Outcome};
use crate::forms::{CommandForm, Field, FormValidator, StrictForms};
use crate::store::Store;
use crate::views::{self, Dashboard, GrantDetail};
use rgms_core::{
    ActorId, DepartmentSummary, Notification, Proposal, ProposalId, Tracker,
};
use std::path::Path;
use tracing::info;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

// =============================================================================
// STATE
// =============================================================================

/// Load the tracker at `db_path`, or an empty one if nothing is stored yet.
pub fn load_or_create_tracker(db_path: &Path, backend: Backend) -> CliResult<Tracker> {
    Ok(Store::open(db_path, backend)?.load()?)
}

/// Save `tracker`, provided nobody else saved since `base_revision`.
pub fn save_tracker(
    tracker: &Tracker,
    db_path: &Path,
    backend: Backend,
    base_revision: u64,
) -> CliResult<()> {
    Store::open(db_path, backend)?.save(tracker, base_revision)?;
    Ok(())
}

/// Run `op` against the stored tracker and save the result.
fn with_tracker<T>(
    db_path: &Path,
    backend: Backend,
    op: impl FnOnce(&mut Tracker) -> rgms_core::Result<T>,
) -> CliResult<T> {
    let store = Store::open(db_path, backend)?;
    let mut tracker = store.load()?;
    let base = tracker.revision();
    let out = op(&mut tracker)?;
    if tracker.revision() != base {
        store.save(&tracker, base)?;
    }
    Ok(out)
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Create an empty database.
pub fn cmd_init(
    db_path: &Path,
    backend: Backend,
    force: bool,
    department_budget: &str,
) -> CliResult<()> {
    if db_path.exists() && !force {
        return Err(format!(
            "database already exists at {}. Use --force to overwrite.",
            db_path.display()
        )
        .into());
    }
    let opening = StrictForms::today().amount("department-budget", &Field::from(department_budget))?;
    if opening.is_negative() {
        return Err(format!("department budget cannot be negative: {opening}").into());
    }
    Store::create(db_path, backend, &Tracker::with_opening_budget(opening))?;
    info!(path = %db_path.display(), %backend, %opening, "database initialised");
    Ok(())
}

/// Register an actor and return its id.
pub fn cmd_register(
    db_path: &Path,
    backend: Backend,
    name: &str,
    role: &str,
    department: &str,
) -> CliResult<ActorId> {
    let role = StrictForms::today().role(role)?;
    with_tracker(db_path, backend, |t| t.register_actor(name, role, department))
}

/// Validate and execute a workflow command as `actor`.
pub fn cmd_execute(
    db_path: &Path,
    backend: Backend,
    actor: u64,
    form: CommandForm,
) -> CliResult<Outcome> {
    let command = StrictForms::today().command(form)?;
    with_tracker(db_path, backend, |t| {
        Dispatcher::new(t).execute(ActorId(actor), command)
    })
}

pub fn cmd_dashboard(db_path: &Path, backend: Backend, researcher: u64) -> CliResult<Dashboard> {
    let tracker = load_or_create_tracker(db_path, backend)?;
    Ok(views::dashboard(&tracker, ActorId(researcher))?)
}

pub fn cmd_queue(db_path: &Path, backend: Backend, actor: u64) -> CliResult<Vec<Proposal>> {
    let tracker = load_or_create_tracker(db_path, backend)?;
    Ok(views::queue(&tracker, ActorId(actor))?)
}

pub fn cmd_grant(db_path: &Path, backend: Backend, proposal: u64) -> CliResult<GrantDetail> {
    let tracker = load_or_create_tracker(db_path, backend)?;
    Ok(views::grant_detail(&tracker, ProposalId(proposal))?)
}

pub fn cmd_analytics(db_path: &Path, backend: Backend, hod: u64) -> CliResult<DepartmentSummary> {
    let tracker = load_or_create_tracker(db_path, backend)?;
    Ok(tracker.department_summary(ActorId(hod))?)
}

/// List an actor's notifications, optionally marking them read.
pub fn cmd_notifications(
    db_path: &Path,
    backend: Backend,
    actor: u64,
    mark_read: bool,
) -> CliResult<Vec<Notification>> {
    let actor = ActorId(actor);
    with_tracker(db_path, backend, |t| {
        let list = views::notifications(t, actor)?;
        if mark_read {
            t.mark_notifications_read(actor)?;
        }
        Ok(list)
    })
}

/// Export the whole state as pretty JSON.
pub fn cmd_export(db_path: &Path, backend: Backend, output: &Path) -> CliResult<()> {
    let tracker = load_or_create_tracker(db_path, backend)?;
    let json = serde_json::to_string_pretty(&tracker.snapshot())?;
    std::fs::write(output, json)?;
    info!(output = %output.display(), revision = tracker.revision(), "state exported");
    Ok(())
}

// =============================================================================
// OUTPUT
// =============================================================================

/// One-line summary of a command outcome.
pub fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::ProposalCreated { proposal, version, status } => {
            format!("{proposal} v{version} created ({status})")
        }
        Outcome::DraftSubmitted { proposal } => format!("{proposal} submitted for review"),
        Outcome::Evaluated { evaluation } => format!("{evaluation} recorded"),
        Outcome::Approved(r) => format!(
            "{} funded by {} with {} (debited {}, department has {} left)",
            r.proposal, r.grant, r.allocated, r.debited, r.department_available
        ),
        Outcome::Rejected { proposal } => format!("{proposal} rejected"),
        Outcome::ToppedUp(r) => format!(
            "{} allocation now {} (usage {}%, department has {} left)",
            r.grant, r.allocated, r.usage, r.department_available
        ),
        Outcome::Reported(r) => match r.usage {
            Some(usage) if r.alert => format!("{} stored. ALERT: budget usage {usage}%", r.report),
            Some(usage) => format!("{} stored, budget usage {usage}%", r.report),
            None => format!("{} stored", r.report),
        },
        Outcome::Intervened { report, status } => format!("{report} stored, project is {status}"),
        Outcome::NotificationsRead { count } => format!("{count} notifications marked read"),
    }
}

/// Tabular proposal listing.
pub fn format_proposals(proposals: &[Proposal]) -> String {
    if proposals.is_empty() {
        return "(no proposals)".to_string();
    }
    proposals
        .iter()
        .map(|p| {
            format!(
                "{:<12} v{:<5} {:<18} {:>12}  {}  {}",
                p.id.to_string(),
                p.version.to_string(),
                p.status.to_string(),
                p.requested.to_string(),
                p.submitted_on,
                p.title
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_notifications(list: &[Notification]) -> String {
    if list.is_empty() {
        return "(no notifications)".to_string();
    }
    list.iter()
        .map(|n| {
            let mark = if n.read { " " } else { "*" };
            format!("{mark} {}  {}", n.message, n.link)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_dashboard(d: &Dashboard) -> String {
    format!(
        "{}\n\n{} unread\n{}",
        format_proposals(&d.proposals),
        d.unread,
        format_notifications(&d.notifications)
    )
}

pub fn format_grant(g: &GrantDetail) -> String {
    let o = &g.overview;
    let mut out = format!(
        "{} '{}'\n{}  {} .. {}\nallocated {}  spent {}  remaining {}  usage {}%{}\n",
        o.grant,
        g.proposal.title,
        g.proposal.status,
        o.start,
        o.end,
        o.allocated,
        o.total_spent,
        o.remaining,
        o.usage,
        if o.alert { "  ALERT" } else { "" }
    );
    for r in &g.reports {
        out.push_str(&format!(
            "\n[{}] {} {}: {}",
            r.submitted_on,
            r.kind.label(),
            r.expenditure,
            r.content
        ));
    }
    out
}

pub fn format_summary(s: &DepartmentSummary) -> String {
    let mut out = format!(
        "department '{}' ({})\navailable {}\ngrants {}  allocated {}  spent {}  remaining {}  usage {}%\n",
        s.department,
        s.hod,
        s.available,
        s.grant_count,
        s.total_allocated,
        s.total_spent,
        s.total_remaining,
        s.usage
    );
    for (status, count) in &s.proposals_by_status {
        out.push_str(&format!("\n{status:<18} {count}"));
    }
    for a in &s.alerts {
        out.push_str(&format!("\nALERT {} at {}%", a.grant, a.usage));
    }
    out
}
