use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    Result,
};

/// What a delete call observed. `NotFound` means the message was already
/// gone, which the dispatcher treats as success.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Port for the external messaging API.
///
/// Telegram is the first implementation. Adapters map their transport errors
/// into the core error kinds: `RateLimited` for back-off signals,
/// `DispatchTransient` for network blips, `DispatchPermanent` for the rest.
#[async_trait]
pub trait ModerationApi: Send + Sync {
    async fn delete_message(&self, chat: ChatId, message_id: MessageId) -> Result<DeleteOutcome>;

    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef>;

    async fn restrict_user(&self, chat: ChatId, user: UserId, until: DateTime<Utc>) -> Result<()>;
}
