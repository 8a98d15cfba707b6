//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Timesheet approvals.
///
/// Submits performa sheets, walks them through review, reconciles
/// billable hours after project completion, and reports weekly totals.
#[derive(Debug, Parser)]
#[command(name = "tsa", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the database, optionally loading a seed file.
    Init {
        /// JSON seed file with teams, users, projects, tasks, leaves
        /// and fill requests.
        #[arg(long)]
        seed: Option<PathBuf>,
    },

    /// Submit a batch of entries read as JSON from a file or stdin.
    Submit {
        /// Acting user id.
        #[arg(long)]
        actor: i64,

        /// Input file; stdin when omitted.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Reference date for the submission (defaults to today).
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Move the actor's entries to pending review.
    Send {
        /// Acting user id.
        #[arg(long)]
        actor: i64,

        /// Entry ids.
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Approve or reject pending entries.
    Review {
        /// Acting user id (must hold a reviewer role).
        #[arg(long)]
        actor: i64,

        /// `approve` or `reject`.
        #[arg(long)]
        decision: String,

        /// Entry ids.
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Delete a rejected or standup entry.
    Delete {
        /// Acting user id (must own the entry).
        #[arg(long)]
        actor: i64,

        /// Entry id.
        id: String,
    },

    /// Convert non-billable hours after all project tasks complete.
    Reconcile {
        /// Acting user id (must hold a reviewer role).
        #[arg(long)]
        actor: i64,

        /// Project id.
        #[arg(long)]
        project: i64,
    },

    /// Per-day weekly totals for a user over a date range.
    Report {
        /// User id to report on.
        #[arg(long)]
        user: i64,

        /// First day of the range (inclusive).
        #[arg(long)]
        from: NaiveDate,

        /// Last day of the range (inclusive).
        #[arg(long)]
        to: NaiveDate,
    },
}
