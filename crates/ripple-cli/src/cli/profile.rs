//! `ripple profile` command.

use console::style;
use ripple_core::directory::ConversationDirectory;
use ripple_types::participant::ParticipantId;

use crate::state::AppState;

/// Show a participant profile.
pub async fn show_profile(state: &AppState, id: &str, json: bool) -> anyhow::Result<()> {
    let participant = state.rest.participant(&ParticipantId::new(id)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&participant)?);
        return Ok(());
    }

    println!();
    println!("  {}", style(&participant.display_name).cyan().bold());
    println!("  {}  {}", style("Id:").bold(), participant.id);
    if let Some(ref avatar) = participant.avatar {
        println!("  {}  {}", style("Avatar:").bold(), style(avatar).dim());
    }
    if let Some(ref bio) = participant.bio {
        println!();
        println!("  {bio}");
    }
    println!();
    Ok(())
}
