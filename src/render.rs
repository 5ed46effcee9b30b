//! Terminal rendering of session snapshots for the demo binary.

use colored::*;

use crate::message::{ChatMessage, SenderKind};
use crate::offer::OfferPhase;
use crate::session::ChatSnapshot;

/// One chat line, colored by sender kind.
pub fn message_line(message: &ChatMessage) -> String {
    match message.sender_kind {
        SenderKind::System => format!("  {}", message.text.bright_yellow()),
        SenderKind::Host => format!(
            "  {} {}",
            format!("{}:", message.sender_name).bright_magenta().bold(),
            message.text
        ),
        SenderKind::User if message.is_local() => format!(
            "  {} {}",
            format!("{}:", message.sender_name).bright_green().bold(),
            message.text
        ),
        SenderKind::User => {
            let name = if message.sender_name.is_empty() {
                "Guest"
            } else {
                message.sender_name.as_str()
            };
            format!("  {} {}", format!("{name}:").bright_blue(), message.text)
        }
    }
}

/// Status line: viewers, offer banner and typing indicator.
pub fn status_line(snapshot: &ChatSnapshot) -> String {
    let mut parts = vec![format!("👁 {} watching", snapshot.viewer_count)];
    match (snapshot.offer, &snapshot.offer_display) {
        (OfferPhase::Active { .. }, Some(display)) => {
            parts.push(format!("OFFER ENDS IN {display}").on_red().white().to_string());
        }
        (OfferPhase::Expired, _) => parts.push("offer closed".dimmed().to_string()),
        _ => {}
    }
    if let Some(typing) = &snapshot.typing {
        parts.push(typing.italic().to_string());
    }
    parts.join("  |  ")
}

pub fn toast_line(text: &str) -> String {
    format!("  💰 {}", text.bright_cyan())
}

/// Lines for messages newer than `last_id` that are currently visible.
/// Advances `last_id` past every new message, rendered or hidden.
pub fn new_lines(snapshot: &ChatSnapshot, last_id: &mut u64) -> Vec<String> {
    let from = *last_id;
    let mut lines = Vec::new();
    for message in snapshot.messages.iter().filter(|m| m.id > from) {
        if snapshot.show_participants || !message.is_participant() {
            lines.push(message_line(message));
        }
        *last_id = message.id;
    }
    lines
}

/// Lines for toasts newer than `last_toast`, advancing it.
pub fn new_toasts(snapshot: &ChatSnapshot, last_toast: &mut u64) -> Vec<String> {
    let seen = *last_toast;
    let mut lines = Vec::new();
    for toast in snapshot.toasts.iter().filter(|t| t.id > seen) {
        lines.push(toast_line(&toast.text));
        *last_toast = toast.id;
    }
    lines
}
