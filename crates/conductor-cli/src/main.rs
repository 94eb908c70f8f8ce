//! Conductor CLI entry point.
//!
//! Binary name: `conductor`
//!
//! Parses CLI arguments, initializes tracing and configuration, then
//! dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use conductor_observe::TracingOptions;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,conductor_core=debug",
        _ => "trace",
    };
    let options = TracingOptions::new(filter).json(cli.log_json).otel(cli.otel);
    conductor_observe::init_tracing(&options)
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "conductor", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init(cli.config.as_deref(), cli.state_dir.as_deref()).await?;

    let result = match cli.command {
        Commands::List => cli::state::handle_list(&state, cli.json).await,
        Commands::Report { workflow_id } => {
            cli::state::handle_report(&state, &workflow_id, cli.json).await
        }
        Commands::Summary { workflow_id } => {
            cli::state::handle_summary(&state, &workflow_id, cli.json).await
        }
        Commands::Recover { workflow_id } => {
            cli::state::handle_recover(&state, &workflow_id, cli.json).await
        }
        Commands::Clean { days } => cli::state::handle_clean(&state, days, cli.json).await,
        Commands::Demo(args) => cli::demo::handle_demo(&state, args, cli.json).await,
        Commands::Completions { .. } => Ok(()),
    };

    conductor_observe::shutdown_tracing();
    result
}
