//! Structural comment classification.
//!
//! Legitimacy is decided from message metadata alone: a message is a comment
//! iff it is the group's auto-forwarded copy of a post from the bound channel,
//! or a reply rooted in the discussion thread of such a copy. Anything
//! ambiguous fails closed as a violation.

use crate::domain::{ChatId, ForwardOrigin, InboundMessage, ReplyTarget, Verdict};

/// Which channel the group is linked to. Comes from config; the classifier
/// itself stays stateless.
#[derive(Clone, Copy, Debug)]
pub struct ChannelBinding {
    pub channel_id: ChatId,
}

pub fn classify(msg: &InboundMessage, binding: &ChannelBinding) -> Verdict {
    // The auto-forwarded copy of a channel post is the thread root itself.
    if is_channel_copy(
        msg.sender_chat,
        msg.forward_origin.as_ref(),
        msg.is_automatic_forward,
        binding,
    ) {
        return Verdict::Legitimate;
    }

    // A genuine threaded comment replies to the auto-forwarded copy, or to
    // another message already inside the discussion thread.
    if let Some(target) = &msg.reply_to {
        if is_comment_root(target, binding) {
            return Verdict::Legitimate;
        }
    }

    // No forward origin, no usable reply target: fail closed.
    Verdict::Violation
}

/// True when the target of a reply anchors a legitimate comment: either the
/// channel's auto-forwarded copy, or a message that itself lives inside a
/// discussion thread (reply-to-a-comment).
fn is_comment_root(target: &ReplyTarget, binding: &ChannelBinding) -> bool {
    if is_channel_copy(
        target.sender_chat,
        target.forward_origin.as_ref(),
        target.is_automatic_forward,
        binding,
    ) {
        return true;
    }
    target.thread_id.is_some()
}

fn is_channel_copy(
    sender_chat: Option<ChatId>,
    forward_origin: Option<&ForwardOrigin>,
    is_automatic_forward: bool,
    binding: &ChannelBinding,
) -> bool {
    let from_bound_channel = forward_origin
        .map(|o| o.chat_id == binding.channel_id)
        .unwrap_or(false);

    if from_bound_channel && is_automatic_forward {
        return true;
    }

    // Posts delivered on behalf of the channel carry its sender_chat.
    sender_chat == Some(binding.channel_id) && from_bound_channel
}
