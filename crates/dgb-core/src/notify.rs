//! Best-effort admin notifications.
//!
//! Everything here is fire-and-forget: a failed notification is logged and
//! never affects moderation outcomes.

use std::sync::Arc;

use tracing::warn;

use crate::{
    api::ModerationApi,
    domain::{ChatId, InboundMessage},
    formatting::{escape_html, message_link},
};

const EXCERPT_LEN: usize = 200;

pub struct AdminNotifier {
    api: Arc<dyn ModerationApi>,
    admin_chat: ChatId,
}

impl AdminNotifier {
    pub fn new(api: Arc<dyn ModerationApi>, admin_chat: ChatId) -> Self {
        Self { api, admin_chat }
    }

    pub async fn send_startup(&self) {
        let text = "🟢 <b>Guard started</b>\n\nMonitoring off-thread messages in the discussion group.";
        if let Err(e) = self.api.send_message(self.admin_chat, text, None).await {
            warn!(error = %e, "failed to send startup notification");
        }
    }

    pub async fn send_shutdown(&self) {
        if let Err(e) = self
            .api
            .send_message(self.admin_chat, "🔴 <b>Guard stopped</b>", None)
            .await
        {
            warn!(error = %e, "failed to send shutdown notification");
        }
    }

    /// Report one removed message to the admin: offender, excerpt, link,
    /// and the violation count it escalated to.
    pub async fn report_violation(&self, msg: &InboundMessage, count: u32) {
        let who = match &msg.sender {
            Some(s) => {
                let mut who = escape_html(&s.full_name);
                if let Some(u) = &s.username {
                    who.push_str(&format!(" (@{})", escape_html(u)));
                }
                who
            }
            None => "Unknown".to_string(),
        };

        let excerpt = match msg.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => {
                let cut: String = t.chars().take(EXCERPT_LEN).collect();
                let ellipsis = if t.chars().count() > EXCERPT_LEN { "…" } else { "" };
                format!("{}{ellipsis}", escape_html(&cut))
            }
            None => "(media without text)".to_string(),
        };

        let link = message_link(msg.chat_id, msg.message_id);
        let text = format!(
            "⚠️ <b>Off-thread message removed</b>\n\n\
             <b>User:</b> {who}\n\
             <b>Violations:</b> {count}\n\
             <b>Text:</b> {excerpt}\n\
             <b>Link:</b> <a href='{link}'>message #{}</a>",
            msg.message_id.0
        );

        if let Err(e) = self.api.send_message(self.admin_chat, &text, None).await {
            warn!(error = %e, "failed to send violation report");
        }
    }
}
