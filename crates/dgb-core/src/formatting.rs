//! HTML-safe text helpers for warnings and admin messages.

use chrono::{DateTime, Utc};

use crate::domain::{ChatId, MessageId, Sender, UserId, ViolationRecord};

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render a warning template for a sender. Supported placeholders:
/// `{username}` (with `@` when available, display name otherwise) and
/// `{full_name}`. All substitutions are HTML-escaped.
pub fn render_warning(template: &str, sender: Option<&Sender>) -> String {
    let (username, full_name) = match sender {
        Some(s) => {
            let username = match &s.username {
                Some(u) => format!("@{}", escape_html(u)),
                None => escape_html(&s.full_name),
            };
            (username, escape_html(&s.full_name))
        }
        None => ("there".to_string(), "Unknown".to_string()),
    };

    template
        .replace("{username}", &username)
        .replace("{full_name}", &full_name)
}

/// Deep link to a message in a supergroup (`-100`-prefixed chat id).
pub fn message_link(chat: ChatId, message_id: MessageId) -> String {
    let chat_str = chat.0.to_string();
    let clean = chat_str.strip_prefix("-100").unwrap_or(&chat_str);
    format!("https://t.me/c/{clean}/{}", message_id.0)
}

/// Admin-facing stats block for `/violations`.
pub fn format_violation_stats(records: &[(UserId, ViolationRecord)], now: DateTime<Utc>) -> String {
    if records.is_empty() {
        return "<b>Violation stats</b>\n\nNo violations recorded.".to_string();
    }

    let mut lines = vec!["<b>Violation stats</b>\n".to_string()];
    for (user, rec) in records {
        let ago = format_elapsed(now.signed_duration_since(rec.last_violation_at));
        let muted = match rec.muted_until {
            Some(until) if until > now => {
                format!(" [muted {}]", format_elapsed(until.signed_duration_since(now)))
            }
            _ => String::new(),
        };
        lines.push(format!(
            "<code>{}</code>: {} violations, last {ago} ago{muted}",
            user.0, rec.count
        ));
    }
    lines.join("\n")
}

fn format_elapsed(d: chrono::Duration) -> String {
    let secs = d.num_seconds().max(0);
    if secs < 60 {
        return format!("{secs}s");
    }
    if secs < 3600 {
        return format!("{}m", secs / 60);
    }
    format!("{}h", secs / 3600)
}
