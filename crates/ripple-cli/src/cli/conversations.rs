//! `ripple conversations` command.

use console::style;
use ripple_core::directory::ConversationDirectory;

use crate::state::AppState;

/// Cap a message preview at 60 characters.
///
/// Counts characters, not bytes: previews are arbitrary user text and a
/// byte cut could land inside a multibyte sequence.
fn preview_snippet(preview: &str) -> String {
    const MAX_CHARS: usize = 60;
    if preview.chars().count() > MAX_CHARS {
        let cut: String = preview.chars().take(MAX_CHARS - 3).collect();
        format!("{cut}...")
    } else {
        preview.to_string()
    }
}

/// List the acting user's conversations.
pub async fn list_conversations(state: &AppState, json: bool) -> anyhow::Result<()> {
    let conversations = state.rest.conversations(&state.user).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&conversations)?);
        return Ok(());
    }

    if conversations.is_empty() {
        println!();
        println!(
            "  {}",
            style("No conversations yet. Start one with: ripple chat <peer>").dim()
        );
        println!();
        return Ok(());
    }

    println!();
    for summary in &conversations {
        let preview = preview_snippet(summary.last_message.as_deref().unwrap_or(""));
        println!(
            "  {:20} {}",
            style(&summary.peer.display_name).cyan().bold(),
            style(preview).dim()
        );
    }
    println!();
    Ok(())
}
