//! Telegram adapter (teloxide).
//!
//! Implements the `dgb-core` ModerationApi over the Telegram Bot API and
//! maps incoming teloxide messages into the core message model.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teloxide::{prelude::*, types::ParseMode, ApiError, RequestError};

pub mod admin;
pub mod handlers;
pub mod map;
pub mod router;

use dgb_core::{
    api::{DeleteOutcome, ModerationApi},
    domain::{ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    Result,
};

#[derive(Clone)]
pub struct TelegramApi {
    bot: Bot,
}

impl TelegramApi {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    /// Map transport errors onto the core's retry taxonomy. The dispatcher
    /// owns the retry loops; this adapter only classifies.
    fn map_err(e: RequestError) -> Error {
        match e {
            RequestError::RetryAfter(d) => Error::RateLimited(d),
            RequestError::Network(e) => Error::DispatchTransient(format!("network: {e}")),
            RequestError::Io(e) => Error::DispatchTransient(format!("i/o: {e}")),
            other => Error::DispatchPermanent(format!("telegram error: {other}")),
        }
    }
}

#[async_trait]
impl ModerationApi for TelegramApi {
    async fn delete_message(&self, chat: ChatId, message_id: MessageId) -> Result<DeleteOutcome> {
        match self
            .bot
            .delete_message(Self::tg_chat(chat), Self::tg_msg_id(message_id))
            .await
        {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(RequestError::Api(
                ApiError::MessageToDeleteNotFound | ApiError::MessageIdInvalid,
            )) => Ok(DeleteOutcome::NotFound),
            Err(e) => Err(Self::map_err(e)),
        }
    }

    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        let mut req = self
            .bot
            .send_message(Self::tg_chat(chat), text.to_string())
            .parse_mode(ParseMode::Html)
            .disable_web_page_preview(true);
        if let Some(reply_to) = reply_to {
            req = req.reply_to_message_id(Self::tg_msg_id(reply_to));
        }

        let msg = req.await.map_err(Self::map_err)?;
        Ok(MessageRef {
            chat_id: chat,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn restrict_user(&self, chat: ChatId, user: UserId, until: DateTime<Utc>) -> Result<()> {
        self.bot
            .restrict_chat_member(
                Self::tg_chat(chat),
                teloxide::types::UserId(user.0 as u64),
                teloxide::types::ChatPermissions::empty(),
            )
            .until_date(until)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }
}
