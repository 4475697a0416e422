//! CLI command definitions and dispatch for the `ripple` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod chat;
pub mod conversations;
pub mod profile;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Realtime direct-message client.
#[derive(Parser)]
#[command(name = "ripple", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Participant id to act as.
    #[arg(long, global = true, env = "RIPPLE_USER", default_value = "")]
    pub user: String,

    /// Override the server base URL from config.
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans via OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open an interactive chat with a peer.
    Chat {
        /// Participant id of the other party.
        peer: String,
    },

    /// List your conversations.
    #[command(alias = "ls")]
    Conversations,

    /// Show a participant profile.
    Profile {
        /// Participant id to look up.
        id: String,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}
