//! teloxide `Message` -> core `InboundMessage` mapping.

use teloxide::types::{Message, MessageKind};

use dgb_core::domain::{
    ChatId, ForwardOrigin, InboundMessage, MessageId, ReplyTarget, Sender, UserId,
};

pub fn inbound_from(msg: &Message) -> InboundMessage {
    InboundMessage {
        chat_id: ChatId(msg.chat.id.0),
        message_id: MessageId(msg.id.0),
        sender: msg.from().map(|user| Sender {
            id: UserId(user.id.0 as i64),
            username: user.username.clone(),
            full_name: user.full_name(),
        }),
        sender_chat: msg.sender_chat().map(|c| ChatId(c.id.0)),
        forward_origin: forward_origin(msg),
        is_automatic_forward: is_automatic_forward(msg),
        reply_to: msg.reply_to_message().map(reply_target),
        thread_id: msg.thread_id,
        text: msg
            .text()
            .or_else(|| msg.caption())
            .map(|s| s.to_string()),
        timestamp: msg.date,
    }
}

fn reply_target(target: &Message) -> ReplyTarget {
    ReplyTarget {
        message_id: MessageId(target.id.0),
        sender_chat: target.sender_chat().map(|c| ChatId(c.id.0)),
        forward_origin: forward_origin(target),
        is_automatic_forward: is_automatic_forward(target),
        thread_id: target.thread_id,
    }
}

fn forward_origin(msg: &Message) -> Option<ForwardOrigin> {
    let chat = msg.forward_from_chat()?;
    Some(ForwardOrigin {
        chat_id: ChatId(chat.id.0),
        message_id: msg.forward_from_message_id().map(MessageId),
    })
}

fn is_automatic_forward(msg: &Message) -> bool {
    match &msg.kind {
        MessageKind::Common(common) => common.is_automatic_forward,
        _ => false,
    }
}
