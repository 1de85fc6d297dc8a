//! Opsflow CLI entry point.
//!
//! Binary name: `opsflow`
//!
//! Parses CLI arguments, wires the engine (plugins, templates, rollback
//! manager, snapshot store), then dispatches to the command handlers.

mod cli;
mod state;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,opsflow=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    let state = AppState::init(cli.dir.clone());

    match cli.command {
        Commands::Validate { file } => {
            cli::validate::validate(&state, &file, cli.json)?;
        }

        Commands::Execute {
            file,
            input,
            dry_run,
        } => {
            cli::execute::execute_file(&state, &file, &input, dry_run, cli.json).await?;
        }

        Commands::Run {
            name,
            input,
            dry_run,
        } => {
            cli::execute::run_by_name(&state, &name, &input, dry_run, cli.json).await?;
        }

        Commands::ListWorkflows => {
            cli::workflows::list_workflows(&state, cli.json)?;
        }

        Commands::ListExecutions { workflow } => {
            cli::executions::list_executions(&state, workflow.as_deref(), cli.json).await?;
        }

        Commands::ShowExecution { id } => {
            cli::executions::show_execution(&state, &id, cli.json).await?;
        }
    }

    Ok(())
}
