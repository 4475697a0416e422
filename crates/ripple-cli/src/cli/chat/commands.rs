//! Slash command parsing for the chat loop.
//!
//! Commands start with `/` and provide in-chat controls for switching
//! conversations, help, and exit.

use console::style;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// Clear the terminal screen.
    Clear,
    /// Exit the chat session.
    Exit,
    /// Switch to a conversation with another peer.
    Switch(String),
    /// Unknown command.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let parts: Vec<&str> = trimmed.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let arg = parts.get(1).map(|s| s.trim().to_string());

    match cmd.as_str() {
        "/help" | "/h" | "/?" => Some(ChatCommand::Help),
        "/clear" | "/cls" => Some(ChatCommand::Clear),
        "/exit" | "/quit" | "/q" => Some(ChatCommand::Exit),
        "/switch" | "/sw" => match arg {
            Some(peer) if !peer.is_empty() => Some(ChatCommand::Switch(peer)),
            _ => Some(ChatCommand::Unknown("/switch requires a peer id".to_string())),
        },
        other => Some(ChatCommand::Unknown(other.to_string())),
    }
}

/// Print the help text listing all available commands.
pub fn print_help() {
    println!();
    println!("  {}", style("Available commands:").bold());
    println!();
    println!("  {}   {}", style("/help").cyan(), "Show this help message");
    println!("  {}  {}", style("/clear").cyan(), "Clear the screen");
    println!("  {}   {}", style("/exit").cyan(), "End the chat session");
    println!(
        "  {} {}",
        style("/switch").cyan(),
        "Switch to a conversation with another peer"
    );
    println!();
    println!("  {}", style("Ctrl+D to exit").dim());
    println!();
}
