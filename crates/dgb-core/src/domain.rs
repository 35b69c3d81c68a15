use chrono::{DateTime, Utc};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Who sent a message, as far as the moderation engine cares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sender {
    pub id: UserId,
    pub username: Option<String>,
    pub full_name: String,
}

/// Where a forwarded message originally came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForwardOrigin {
    pub chat_id: ChatId,
    pub message_id: Option<MessageId>,
}

/// The message a reply points at, reduced to the metadata classification
/// needs. Telegram materializes the target inline, so provenance of the
/// target is available without extra API calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyTarget {
    pub message_id: MessageId,
    pub sender_chat: Option<ChatId>,
    pub forward_origin: Option<ForwardOrigin>,
    pub is_automatic_forward: bool,
    pub thread_id: Option<i32>,
}

/// An incoming group message, stripped down to what the classifier and
/// coordinator consume. Ephemeral; never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub sender: Option<Sender>,
    pub sender_chat: Option<ChatId>,
    pub forward_origin: Option<ForwardOrigin>,
    pub is_automatic_forward: bool,
    pub reply_to: Option<ReplyTarget>,
    pub thread_id: Option<i32>,
    pub text: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    pub fn msg_ref(&self) -> MessageRef {
        MessageRef {
            chat_id: self.chat_id,
            message_id: self.message_id,
        }
    }
}

/// Per-(chat, user) escalation state. Owned by the store; everything else
/// only ever holds transient copies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViolationRecord {
    pub count: u32,
    pub last_violation_at: DateTime<Utc>,
    pub muted_until: Option<DateTime<Utc>>,
}

/// Classification result for one message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Legitimate,
    Violation,
}

/// What the dispatcher must do for one violation. Produced exactly once by
/// the escalation policy, consumed exactly once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    DeleteOnly,
    DeleteAndWarn { text: String, tier: u8 },
    DeleteAndRestrict { until: DateTime<Utc> },
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::DeleteOnly => "delete",
            Action::DeleteAndWarn { .. } => "warn",
            Action::DeleteAndRestrict { .. } => "restrict",
        }
    }
}
