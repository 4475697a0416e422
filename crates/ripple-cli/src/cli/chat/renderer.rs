//! Terminal rendering of timeline snapshots.
//!
//! The session bus publishes whole-timeline snapshots; the renderer tracks
//! how many entries it has already printed and only emits the tail. A
//! shrinking snapshot means the conversation was switched, so the printed
//! count resets and the new timeline is printed from the top.
//!
//! An entry printed while pending can later be confirmed in place by the
//! room echo. The terminal line is already scrolled away by then, so the
//! renderer remembers which printed indexes were still pending and emits a
//! delivery note once they flip.

use std::io::Write;

use console::style;
use ripple_types::participant::ParticipantId;
use ripple_types::session::TimelineEntry;

/// Incremental timeline printer.
pub struct ChatRenderer {
    self_id: ParticipantId,
    peer_name: String,
    printed: usize,
    pending_printed: Vec<usize>,
}

impl ChatRenderer {
    pub fn new(self_id: ParticipantId, peer_name: impl Into<String>) -> Self {
        Self {
            self_id,
            peer_name: peer_name.into(),
            printed: 0,
            pending_printed: Vec::new(),
        }
    }

    /// Replace the peer label (after a `/switch`).
    pub fn set_peer_name(&mut self, name: impl Into<String>) {
        self.peer_name = name.into();
    }

    /// Forget printed entries so the next snapshot prints from the top.
    pub fn reset(&mut self) {
        self.printed = 0;
        self.pending_printed.clear();
    }

    /// Print any entries this renderer has not shown yet, plus a delivery
    /// note for previously printed entries that have since been confirmed.
    pub fn render_new(&mut self, timeline: &[TimelineEntry], out: &mut impl Write) {
        if timeline.len() < self.printed {
            // Conversation switched: the snapshot restarted.
            self.reset();
            let _ = writeln!(out, "  {}", style("---").dim());
        }

        let mut delivered = 0usize;
        self.pending_printed.retain(|&idx| {
            match timeline.get(idx) {
                Some(entry) if !entry.is_pending() => {
                    delivered += 1;
                    false
                }
                Some(_) => true,
                None => false,
            }
        });
        if delivered > 0 {
            let _ = writeln!(out, "  {}", style("* delivered").dim());
        }

        for (idx, entry) in timeline.iter().enumerate().skip(self.printed) {
            let _ = writeln!(out, "{}", self.format_entry(entry));
            if entry.is_pending() {
                self.pending_printed.push(idx);
            }
        }
        self.printed = timeline.len();
    }

    fn format_entry(&self, entry: &TimelineEntry) -> String {
        let time = entry
            .message
            .created_at
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_else(|| "--:--".to_string());

        let label = if entry.message.sender_id == self.self_id {
            style("You").green().bold().to_string()
        } else {
            style(self.peer_name.as_str()).cyan().bold().to_string()
        };

        let marker = if entry.is_pending() {
            format!(" {}", style("(sending)").dim())
        } else {
            String::new()
        };

        format!(
            "  {} {} {}{marker}",
            style(time).dim(),
            label,
            entry.message.content
        )
    }
}
