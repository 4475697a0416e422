//! Async readline input handling for the chat loop.
//!
//! Wraps `rustyline_async::Readline` and owns the input policy of the chat
//! loop: lines are trimmed and blank submissions are swallowed here, so the
//! session layer only ever sees content-bearing lines, and the prompt
//! tracks the session phase so the user can tell a live session from a
//! degraded one at a glance.

use ripple_types::session::SessionPhase;
use rustyline_async::{Readline, ReadlineError, SharedWriter};

/// Events produced by the input handler.
#[derive(Debug)]
pub enum InputEvent {
    /// User submitted a non-empty line, already trimmed.
    Line(String),
    /// End of file (Ctrl+D).
    Eof,
    /// Interrupt signal (Ctrl+C).
    Interrupted,
}

/// Render the prompt for a session phase.
///
/// `Live` gets the normal green prompt; `Reconnecting` switches to a
/// yellow `offline` marker since sends are queued, not delivered; every
/// other phase dims the prompt.
pub fn prompt_for(phase: SessionPhase) -> String {
    use console::style;
    match phase {
        SessionPhase::Live => format!("  {} ", style("You >").green().bold()),
        SessionPhase::Reconnecting => format!("  {} ", style("offline >").yellow().bold()),
        _ => format!("  {} ", style("You >").dim()),
    }
}

/// Async input handler wrapping rustyline_async.
pub struct ChatInput {
    rl: Readline,
}

impl ChatInput {
    /// Create a new chat input handler, prompting for the `Loading` phase
    /// until the first phase change arrives.
    ///
    /// Returns the input handler and a `SharedWriter` that can be used to
    /// print incoming messages without interfering with the readline prompt.
    pub fn new() -> Result<(Self, SharedWriter), ReadlineError> {
        let (rl, stdout) = Readline::new(prompt_for(SessionPhase::Loading))?;
        Ok((Self { rl }, stdout))
    }

    /// Swap the prompt to match a new session phase.
    pub fn set_phase(&mut self, phase: SessionPhase) {
        let _ = self.rl.update_prompt(&prompt_for(phase));
    }

    /// Read the next content-bearing line of input.
    ///
    /// Blank submissions redraw the prompt and keep reading; only trimmed,
    /// non-empty lines surface as [`InputEvent::Line`]. Cancel-safe, so it
    /// can sit in a `select!` against the session bus.
    pub async fn read_line(&mut self) -> InputEvent {
        loop {
            match self.rl.readline().await {
                Ok(rustyline_async::ReadlineEvent::Line(line)) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    return InputEvent::Line(trimmed.to_string());
                }
                Ok(rustyline_async::ReadlineEvent::Eof) => return InputEvent::Eof,
                Ok(rustyline_async::ReadlineEvent::Interrupted) => return InputEvent::Interrupted,
                Err(_) => return InputEvent::Eof,
            }
        }
    }

    /// Clear the terminal screen.
    pub fn clear(&mut self) {
        let _ = self.rl.clear();
    }
}
