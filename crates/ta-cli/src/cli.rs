//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Shop-floor time and attendance.
///
/// Clocks employees in and out of jobs, enforces per-job requirements,
/// and keeps an append-only audit trail of every change.
#[derive(Debug, Parser)]
#[command(name = "ta", version, about, long_about = None)]
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
    /// Clock an employee in on a job.
    In {
        /// Employee number.
        #[arg(long)]
        emp: i64,

        /// Operation (job) number.
        #[arg(long)]
        job: u32,

        /// Job description to record on the session.
        #[arg(long)]
        desc: Option<String>,

        /// Cost code in `suffix\item\sequence` form.
        #[arg(long)]
        cost_code: Option<String>,

        #[command(flatten)]
        when: WhenArgs,

        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Clock an employee out of their open session.
    Out {
        /// Employee number.
        #[arg(long)]
        emp: i64,

        /// Produced quantity.
        #[arg(long)]
        units: Option<String>,

        /// Split code.
        #[arg(long)]
        split: Option<String>,

        /// Mark the session as a break.
        #[arg(long = "break")]
        break_flag: bool,

        #[command(flatten)]
        when: WhenArgs,

        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Close an open session by manager override, skipping the usual
    /// chronology checks.
    ForceOut {
        /// Employee number.
        #[arg(long)]
        emp: i64,

        /// Name of the manager performing the override.
        #[arg(long)]
        manager: String,

        #[command(flatten)]
        when: WhenArgs,
    },

    /// Show whether an employee is clocked in.
    Status {
        /// Employee number.
        #[arg(long)]
        emp: i64,

        /// Emit the open session as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the audit history for an employee or a session.
    History {
        /// Employee number.
        #[arg(long, conflicts_with = "session")]
        emp: Option<i64>,

        /// Session id.
        #[arg(long)]
        session: Option<String>,
    },

    /// Manage job configuration.
    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },
}

/// Job configuration subcommands.
#[derive(Debug, Subcommand)]
pub enum JobsAction {
    /// Set the requirement flags for an (employee, job) pair.
    Require {
        /// Employee number.
        #[arg(long)]
        emp: i64,

        /// Operation (job) number.
        #[arg(long)]
        job: u32,

        /// Allow the employee to clock onto this job.
        #[arg(long)]
        clockable: bool,

        /// Require a cost code on clock-in.
        #[arg(long)]
        cost_code: bool,

        /// Require a produced quantity on clock-out.
        #[arg(long)]
        quantity: bool,

        /// Require a split code on clock-out.
        #[arg(long)]
        split: bool,
    },

    /// Register a cost code for a job.
    AddCostCode {
        /// Operation (job) number.
        #[arg(long)]
        job: u32,

        /// Job suffix segment.
        #[arg(long)]
        sfx: String,

        /// BOM item segment.
        #[arg(long)]
        item: String,

        /// Sequence segment.
        #[arg(long)]
        seq: String,

        /// Register the code as inactive.
        #[arg(long)]
        inactive: bool,
    },

    /// Show requirements and cost codes for an (employee, job) pair.
    Show {
        /// Employee number.
        #[arg(long)]
        emp: i64,

        /// Operation (job) number.
        #[arg(long)]
        job: u32,
    },
}

/// When the clock event happened. Defaults to the wall clock.
#[derive(Debug, Args)]
pub struct WhenArgs {
    /// Time of the event, e.g. `2025-06-02T08:00:00`. Defaults to now.
    #[arg(long)]
    pub time: Option<String>,
}

/// Who is performing the operation, for the audit trail.
#[derive(Debug, Args)]
pub struct ActorArgs {
    /// Actor name recorded in the audit trail.
    #[arg(long, default_value = "terminal")]
    pub actor: String,

    /// Actor role recorded in the audit trail.
    #[arg(long, default_value = "operator")]
    pub role: String,
}
