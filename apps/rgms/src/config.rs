//! # Configuration
//!
//! Command-line surface of the `rgms` binary. Every global option has an
//! environment fallback so the server can be configured without flags.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

// =============================================================================
// BACKEND
// =============================================================================

/// Where tracker state lives on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Backend {
    /// Single snapshot file, rewritten on every change.
    #[default]
    File,
    /// redb database, one table per entity kind.
    Redb,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::File => "file",
            Self::Redb => "redb",
        })
    }
}

// =============================================================================
// CLI
// =============================================================================

#[derive(Debug, Parser)]
#[command(name = "rgms", version, about = "Research grant management: proposals, reviews, grants and budgets")]
pub struct Cli {
    /// Database path
    #[arg(long, global = true, env = "RGMS_DB", default_value = "rgms.db")]
    pub db: PathBuf,

    /// Storage backend
    #[arg(long, global = true, env = "RGMS_BACKEND", value_enum, default_value_t = Backend::File)]
    pub backend: Backend,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Default log filter (RUST_LOG takes precedence)
    #[arg(long, global = true, env = "RGMS_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// The actor a workflow command runs as.
#[derive(Debug, Clone, Copy, Args)]
pub struct Acting {
    /// Acting actor id
    #[arg(long = "as", value_name = "ACTOR")]
    pub actor: u64,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create an empty tracker database
    Init {
        /// Overwrite an existing database
        #[arg(long)]
        force: bool,
        /// Opening funds of every HOD registered afterwards
        #[arg(long, env = "RGMS_DEPARTMENT_BUDGET", default_value = "500000.00")]
        department_budget: String,
    },
    /// Register a researcher, reviewer or HOD
    Register {
        name: String,
        /// researcher | reviewer | hod
        #[arg(long)]
        role: String,
        #[arg(long, default_value = "")]
        department: String,
    },
    /// Submit a new proposal for review
    Submit {
        #[command(flatten)]
        acting: Acting,
        #[arg(long)]
        title: String,
        #[arg(long)]
        requested: String,
        /// Submission date (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Save a proposal as a draft
    Draft {
        #[command(flatten)]
        acting: Acting,
        #[arg(long)]
        title: String,
        #[arg(long)]
        requested: String,
        #[arg(long)]
        date: Option<String>,
    },
    /// Send a saved draft for review
    SendDraft {
        #[command(flatten)]
        acting: Acting,
        proposal: u64,
    },
    /// Submit the next version of a proposal
    Resubmit {
        #[command(flatten)]
        acting: Acting,
        proposal: u64,
        /// New requested amount (default: unchanged)
        #[arg(long)]
        requested: Option<String>,
        #[arg(long)]
        date: Option<String>,
    },
    /// Score a proposal
    Evaluate {
        #[command(flatten)]
        acting: Acting,
        proposal: u64,
        #[arg(long)]
        score: String,
        #[arg(long, default_value = "")]
        comments: String,
    },
    /// Approve a reviewed proposal and fund its grant
    Approve {
        #[command(flatten)]
        acting: Acting,
        proposal: u64,
        #[arg(long)]
        allocated: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
    /// Reject a proposal
    Reject {
        #[command(flatten)]
        acting: Acting,
        proposal: u64,
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// Raise a grant's allocation
    TopUp {
        #[command(flatten)]
        acting: Acting,
        grant: u64,
        #[arg(long)]
        amount: String,
    },
    /// Submit a progress report
    Report {
        #[command(flatten)]
        acting: Acting,
        proposal: u64,
        #[arg(long)]
        content: String,
        #[arg(long, default_value = "")]
        milestones: String,
        #[arg(long, default_value = "0")]
        expenditure: String,
        #[arg(long)]
        date: Option<String>,
    },
    /// Record HOD feedback on a funded project
    Intervene {
        #[command(flatten)]
        acting: Acting,
        proposal: u64,
        #[arg(long)]
        feedback: String,
        /// on-track | needs-intervention
        #[arg(long)]
        health: String,
        #[arg(long)]
        date: Option<String>,
    },
    /// Show a researcher's dashboard
    Dashboard { researcher: u64 },
    /// Show the review or approval queue of an actor
    Queue {
        #[command(flatten)]
        acting: Acting,
    },
    /// Show the grant of a proposal
    Grant { proposal: u64 },
    /// Show an HOD's department summary
    Analytics { hod: u64 },
    /// List an actor's notifications
    Notifications {
        actor: u64,
        /// Mark them read afterwards
        #[arg(long)]
        mark_read: bool,
    },
    /// Export the whole state as JSON
    Export { output: PathBuf },
    /// Start the HTTP API server
    Serve {
        #[arg(long, env = "RGMS_HOST", default_value = "127.0.0.1")]
        host: String,
        #[arg(long, env = "RGMS_PORT", default_value_t = 8080)]
        port: u16,
    },
}

/// Parse `host:port` into a socket address.
pub fn socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    format!("{host}:{port}")
        .parse()
        .map_err(|e| format!("invalid listen address {host}:{port}: {e}"))
}
