//! Telegram update handlers: group moderation plus private admin commands.

use std::sync::Arc;

use teloxide::{prelude::*, types::ParseMode};
use tracing::{debug, error};

use dgb_core::coordinator::HandleOutcome;
use dgb_core::domain::UserId;
use dgb_core::formatting::format_violation_stats;

use crate::map;
use crate::router::AppState;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    // Private chats only carry the admin command surface; every group
    // message goes through moderation.
    if msg.chat.is_private() {
        return handle_private(bot, msg, state).await;
    }

    if msg.chat.id.0 != state.cfg.group_id.0 {
        return Ok(());
    }

    if let Some(user) = msg.from() {
        if state.admins.is_admin(user.id.0).await {
            debug!(user = user.id.0, "admin message, skipping moderation");
            return Ok(());
        }
    }

    let inbound = map::inbound_from(&msg);
    match state.coordinator.handle(&inbound).await {
        Ok(HandleOutcome::Legitimate) => {}
        Ok(HandleOutcome::Enforced { count, .. }) => {
            state.notifier.report_violation(&inbound, count).await;
        }
        Err(e) => {
            // Failures are isolated per message; log and keep polling.
            error!(
                chat = inbound.chat_id.0,
                msg_id = inbound.message_id.0,
                error = %e,
                "failed to handle message"
            );
        }
    }

    Ok(())
}

async fn handle_private(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let is_admin = msg
        .from()
        .map(|u| u.id.0 as i64 == state.cfg.admin_id.0)
        .unwrap_or(false);
    if !is_admin {
        bot.send_message(
            msg.chat.id,
            "This bot moderates a channel discussion group. Nothing to see here.",
        )
        .await?;
        return Ok(());
    }

    let (cmd, args) = parse_command(text);
    match cmd.as_str() {
        "status" => {
            let cfg = &state.cfg;
            let reply = format!(
                "🟢 <b>Guard status</b>\n\n\
                 Group: <code>{}</code>\n\
                 Channel: <code>{}</code>\n\
                 Warn tier 2 from: <code>{}</code>\n\
                 Restrict from: <code>{}</code>\n\
                 Store: <code>{}</code>",
                cfg.group_id.0,
                cfg.channel_id.0,
                cfg.warn_tier2_at,
                cfg.restrict_at,
                cfg.db_path.display(),
            );
            bot.send_message(msg.chat.id, reply)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        "violations" => {
            let reply = match state.coordinator.store().all(state.cfg.group_id).await {
                Ok(records) => format_violation_stats(&records, chrono::Utc::now()),
                Err(e) => format!("Store error: {e}"),
            };
            bot.send_message(msg.chat.id, reply)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        "reset" => {
            let reply = match args.trim().parse::<i64>() {
                Ok(user_id) => {
                    match state
                        .coordinator
                        .store()
                        .reset(state.cfg.group_id, UserId(user_id))
                        .await
                    {
                        Ok(()) => format!("Violations cleared for user {user_id}."),
                        Err(e) => format!("Store error: {e}"),
                    }
                }
                Err(_) => "Usage: /reset <user_id>".to_string(),
            };
            bot.send_message(msg.chat.id, reply).await?;
        }
        _ => {
            bot.send_message(msg.chat.id, "Commands: /status /violations /reset <user_id>")
                .await?;
        }
    }

    Ok(())
}

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}
