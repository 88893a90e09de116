//! # rgms
//!
//! Research grant management CLI and HTTP server.

use clap::Parser;
use rgms::cli::{
    cmd_analytics, cmd_dashboard, cmd_execute, cmd_export, cmd_grant, cmd_init,
    cmd_notifications, cmd_queue, cmd_register, describe, format_dashboard, format_grant,
    format_notifications, format_proposals, format_summary, CliResult,
};
use rgms::config::{socket_addr, Cli, Commands};
use rgms::forms::{CommandForm, Field};
use rgms::store::Store;
use serde::Serialize;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce(&T) -> String) -> CliResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", human(value));
    }
    Ok(())
}

fn opt(raw: Option<String>) -> Option<Field> {
    raw.map(Field::from)
}

async fn run(cli: Cli) -> CliResult<()> {
    let Cli {
        db,
        backend,
        json,
        command,
        ..
    } = cli;

    let (actor, form) = match command {
        Commands::Init {
            force,
            department_budget,
        } => {
            cmd_init(&db, backend, force, &department_budget)?;
            println!("initialised {} ({backend})", db.display());
            return Ok(());
        }
        Commands::Register {
            name,
            role,
            department,
        } => {
            let id = cmd_register(&db, backend, &name, &role, &department)?;
            return emit(json, &serde_json::json!({ "id": id }), |_| format!("registered {id}"));
        }
        Commands::Dashboard { researcher } => {
            let d = cmd_dashboard(&db, backend, researcher)?;
            return emit(json, &d, format_dashboard);
        }
        Commands::Queue { acting } => {
            let q = cmd_queue(&db, backend, acting.actor)?;
            return emit(json, &q, |q| format_proposals(q));
        }
        Commands::Grant { proposal } => {
            let g = cmd_grant(&db, backend, proposal)?;
            return emit(json, &g, format_grant);
        }
        Commands::Analytics { hod } => {
            let s = cmd_analytics(&db, backend, hod)?;
            return emit(json, &s, format_summary);
        }
        Commands::Notifications { actor, mark_read } => {
            let list = cmd_notifications(&db, backend, actor, mark_read)?;
            return emit(json, &list, |l| format_notifications(l));
        }
        Commands::Export { output } => {
            cmd_export(&db, backend, &output)?;
            println!("exported to {}", output.display());
            return Ok(());
        }
        Commands::Serve { host, port } => {
            let addr = socket_addr(&host, port)?;
            let store = Store::open(&db, backend)?;
            return rgms::api::serve(addr, store).await;
        }

        Commands::Submit {
            acting,
            title,
            requested,
            date,
        } => (
            acting,
            CommandForm::Submit {
                title,
                requested: requested.into(),
                date: opt(date),
            },
        ),
        Commands::Draft {
            acting,
            title,
            requested,
            date,
        } => (
            acting,
            CommandForm::Draft {
                title,
                requested: requested.into(),
                date: opt(date),
            },
        ),
        Commands::SendDraft { acting, proposal } => (acting, CommandForm::SendDraft { proposal }),
        Commands::Resubmit {
            acting,
            proposal,
            requested,
            date,
        } => (
            acting,
            CommandForm::Resubmit {
                proposal,
                requested: opt(requested),
                date: opt(date),
            },
        ),
        Commands::Evaluate {
            acting,
            proposal,
            score,
            comments,
        } => (
            acting,
            CommandForm::Evaluate {
                proposal,
                score: score.into(),
                comments,
            },
        ),
        Commands::Approve {
            acting,
            proposal,
            allocated,
            start,
            end,
        } => (
            acting,
            CommandForm::Approve {
                proposal,
                allocated: allocated.into(),
                start: start.into(),
                end: end.into(),
            },
        ),
        Commands::Reject {
            acting,
            proposal,
            reason,
        } => (acting, CommandForm::Reject { proposal, reason }),
        Commands::TopUp {
            acting,
            grant,
            amount,
        } => (
            acting,
            CommandForm::TopUp {
                grant,
                amount: amount.into(),
            },
        ),
        Commands::Report {
            acting,
            proposal,
            content,
            milestones,
            expenditure,
            date,
        } => (
            acting,
            CommandForm::Report {
                proposal,
                content,
                milestones,
                expenditure: Some(expenditure.into()),
                date: opt(date),
            },
        ),
        Commands::Intervene {
            acting,
            proposal,
            feedback,
            health,
            date,
        } => (
            acting,
            CommandForm::Intervene {
                proposal,
                feedback,
                health: health.into(),
                date: opt(date),
            },
        ),
    };

    let outcome = cmd_execute(&db, backend, actor.actor, form)?;
    emit(json, &outcome, describe)
}
