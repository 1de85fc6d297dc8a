//! CLI command definitions and dispatch for the `opsflow` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod execute;
pub mod executions;
pub mod validate;
pub mod workflows;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Validate and execute declarative operational workflows.
#[derive(Parser)]
#[command(name = "opsflow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Directory scanned for workflow files.
    #[arg(long, global = true, default_value = "workflows")]
    pub dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a workflow file without executing it.
    Validate {
        /// Path to the workflow YAML or JSON file.
        file: PathBuf,
    },

    /// Execute a workflow from a file.
    Execute {
        /// Path to the workflow YAML or JSON file.
        file: PathBuf,

        /// Workflow input as NAME=VALUE (repeatable; VALUE parsed as JSON
        /// when possible, else taken as a string).
        #[arg(long = "input", short = 'i', value_name = "NAME=VALUE")]
        input: Vec<String>,

        /// Simulate the run without side effects.
        #[arg(long)]
        dry_run: bool,
    },

    /// Execute a workflow by name from the workflows directory.
    Run {
        /// Workflow name (the `name:` field, not the filename).
        name: String,

        /// Workflow input as NAME=VALUE (repeatable).
        #[arg(long = "input", short = 'i', value_name = "NAME=VALUE")]
        input: Vec<String>,

        /// Simulate the run without side effects.
        #[arg(long)]
        dry_run: bool,
    },

    /// List workflows found in the workflows directory.
    #[command(name = "list-workflows")]
    ListWorkflows,

    /// List executions recorded in the snapshot store.
    #[command(name = "list-executions")]
    ListExecutions {
        /// Only show executions of this workflow.
        #[arg(long)]
        workflow: Option<String>,
    },

    /// Show one execution record in full.
    #[command(name = "show-execution")]
    ShowExecution {
        /// Execution UUID.
        id: String,
    },
}
