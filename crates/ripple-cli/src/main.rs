//! Ripple terminal chat client entry point.
//!
//! Binary name: `ripple`
//!
//! Parses CLI arguments, loads configuration, wires the REST and WebSocket
//! adapters, then dispatches to the appropriate command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,ripple=debug",
        _ => "trace",
    };
    ripple_observe::tracing_setup::init_tracing(cli.otel, filter)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "ripple", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init(&cli).await?;

    match cli.command {
        Commands::Chat { ref peer } => {
            cli::chat::run_chat_loop(&state, peer).await?;
        }

        Commands::Conversations => {
            cli::conversations::list_conversations(&state, cli.json).await?;
        }

        Commands::Profile { ref id } => {
            cli::profile::show_profile(&state, id, cli.json).await?;
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    ripple_observe::tracing_setup::shutdown_tracing();
    Ok(())
}
