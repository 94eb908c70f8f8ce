//! CLI command definitions for the `conductor` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod demo;
pub mod state;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use comfy_table::{Cell, Color};

/// Inspect and recover cross-application workflow runs.
#[derive(Parser)]
#[command(name = "conductor", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Only log errors. Command results are still printed.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to conductor.toml.
    #[arg(long, global = true, env = "CONDUCTOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Snapshot directory (overrides `state.state_dir`).
    #[arg(long, global = true, env = "CONDUCTOR_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List persisted workflow snapshots.
    #[command(alias = "ls")]
    List,

    /// Print the full report for a workflow.
    Report {
        /// Workflow id.
        workflow_id: String,
    },

    /// Print a one-line summary for a workflow.
    Summary {
        /// Workflow id.
        workflow_id: String,
    },

    /// Show whether a workflow can be resumed and from which step.
    Recover {
        /// Workflow id.
        workflow_id: String,
    },

    /// Delete snapshots older than the retention window.
    Clean {
        /// Days to keep (defaults to `state.days_to_keep`).
        #[arg(long)]
        days: Option<u32>,
    },

    /// Run the built-in demo workflow against the snapshot directory.
    Demo(demo::DemoArgs),

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Table cell for a status string, coloured by outcome.
pub(crate) fn status_cell(status: &str) -> Cell {
    let color = match status {
        "completed" => Color::Green,
        "failed" => Color::Red,
        "cancelled" | "skipped" => Color::Yellow,
        "running" => Color::Blue,
        _ => Color::Grey,
    };
    Cell::new(status).fg(color)
}
