//! Main chat loop orchestration.
//!
//! Resolves the conversation, spawns the session synchronizer, then
//! multiplexes readline input against session events: timeline snapshots
//! are rendered incrementally, phase changes become dim status lines, and
//! submitted lines go down the optimistic-send path.

use std::io::Write;
use std::sync::Arc;

use console::style;
use ripple_core::directory::ConversationDirectory;
use ripple_core::session::SessionSync;
use ripple_core::transport::Transport;
use ripple_types::conversation::ConversationHandle;
use ripple_types::participant::{Participant, ParticipantId};
use ripple_types::session::{SessionEvent, SessionPhase};
use tokio::sync::broadcast;
use tracing::info;

use crate::state::AppState;

use super::banner::print_welcome_banner;
use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};
use super::renderer::ChatRenderer;

/// Resolve a peer id to its conversation handle and profile.
///
/// A missing profile is not fatal: the raw id serves as the display name.
async fn resolve_peer(
    state: &AppState,
    peer: &str,
) -> anyhow::Result<(ConversationHandle, Option<Participant>)> {
    let peer_id = ParticipantId::new(peer);
    let profile = state.rest.participant(&peer_id).await.ok();
    let conversation = state
        .rest
        .get_or_create(&peer_id)
        .await
        .map_err(|e| anyhow::anyhow!("could not resolve conversation with {peer}: {e}"))?;
    Ok((conversation, profile))
}

/// Run the interactive chat loop with a peer.
pub async fn run_chat_loop(state: &AppState, peer: &str) -> anyhow::Result<()> {
    let (conversation, profile) = resolve_peer(state, peer).await?;
    let peer_name = profile
        .as_ref()
        .map(|p| p.display_name.clone())
        .unwrap_or_else(|| peer.to_string());

    print_welcome_banner(
        &peer_name,
        profile.as_ref().and_then(|p| p.bio.as_deref()),
        conversation.as_str(),
    );

    state.transport.connect().await?;
    let (handle, task) = SessionSync::spawn(
        state.user.clone(),
        Arc::clone(&state.transport),
        Arc::clone(&state.rest),
    );
    let mut events = handle.subscribe();
    handle.open(conversation).await;
    info!(user = %state.user, peer = %peer, "chat session started");

    let (mut input, mut writer) =
        ChatInput::new().map_err(|e| anyhow::anyhow!("failed to initialize input: {e}"))?;
    let mut renderer = ChatRenderer::new(state.user.clone(), peer_name);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SessionEvent::TimelineUpdated { timeline }) => {
                    renderer.render_new(&timeline, &mut writer);
                }
                Ok(SessionEvent::PhaseChanged { phase }) => {
                    input.set_phase(phase);
                    let note = match phase {
                        SessionPhase::Loading => Some("loading history..."),
                        SessionPhase::Reconnecting => Some("connection lost, reconnecting..."),
                        SessionPhase::Live => Some("live"),
                        _ => None,
                    };
                    if let Some(note) = note {
                        let _ = writeln!(writer, "  {}", style(note).dim());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },

            event = input.read_line() => match event {
                InputEvent::Eof => {
                    println!("\n  {}", style("Session ended.").dim());
                    break;
                }
                InputEvent::Interrupted => {
                    let _ = writeln!(
                        writer,
                        "  {}",
                        style("Press Ctrl+D to exit, or keep chatting.").dim()
                    );
                }
                InputEvent::Line(text) => {
                    if let Some(cmd) = commands::parse(&text) {
                        match cmd {
                            ChatCommand::Help => commands::print_help(),
                            ChatCommand::Clear => input.clear(),
                            ChatCommand::Exit => {
                                println!("\n  {}", style("Session ended.").dim());
                                break;
                            }
                            ChatCommand::Switch(next_peer) => {
                                match resolve_peer(state, &next_peer).await {
                                    Ok((conversation, profile)) => {
                                        let name = profile
                                            .map(|p| p.display_name)
                                            .unwrap_or_else(|| next_peer.clone());
                                        let _ = writeln!(
                                            writer,
                                            "  {} {}",
                                            style("Switched to").dim(),
                                            style(&name).cyan().bold()
                                        );
                                        renderer.set_peer_name(name);
                                        renderer.reset();
                                        handle.open(conversation).await;
                                    }
                                    Err(err) => {
                                        let _ = writeln!(
                                            writer,
                                            "  {} {err}",
                                            style("!").red().bold()
                                        );
                                    }
                                }
                            }
                            ChatCommand::Unknown(cmd_name) => {
                                let _ = writeln!(
                                    writer,
                                    "  {} Unknown command: {}. Type /help for available commands.",
                                    style("?").yellow().bold(),
                                    style(cmd_name).dim()
                                );
                            }
                        }
                        continue;
                    }

                    if let Err(err) = handle.submit(text).await {
                        let _ = writeln!(writer, "  {} {err}", style("!").red().bold());
                    }
                }
            }
        }
    }

    handle.close().await;
    let _ = task.await;
    state.transport.disconnect().await;
    Ok(())
}
