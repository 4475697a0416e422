//! Welcome banner display for chat sessions.

use console::style;

/// Abbreviate a conversation handle for display.
///
/// Handles are opaque server strings, so the cut counts characters rather
/// than bytes.
fn short_handle(conversation: &str) -> String {
    conversation.chars().take(12).collect()
}

/// Print the welcome banner at the start of a chat session.
///
/// Displays the peer's name and bio (when present) plus a hint about slash
/// commands.
pub fn print_welcome_banner(peer_name: &str, bio: Option<&str>, conversation: &str) {
    println!();
    println!("  {}", style(peer_name).cyan().bold());
    if let Some(bio) = bio {
        println!("  {}", style(bio).dim());
    }
    println!();
    println!(
        "  {}  {}",
        style("Conversation:").bold(),
        style(short_handle(conversation)).dim()
    );
    println!();
    println!("  {}", style("Type /help for commands, Ctrl+D to exit").dim());
    println!("  {}", style("---").dim());
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_handle_truncates_long_handles() {
        assert_eq!(short_handle("66b2f0c4e1a9deadbeef"), "66b2f0c4e1a9");
        assert_eq!(short_handle("c1"), "c1");
    }

    #[test]
    fn test_short_handle_is_multibyte_safe() {
        let handle: String = std::iter::repeat('ж').take(20).collect();
        assert_eq!(short_handle(&handle).chars().count(), 12);
    }
}
