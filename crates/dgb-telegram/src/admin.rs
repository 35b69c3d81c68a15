//! Group administrator cache.
//!
//! Admins are exempt from moderation. The admin list is fetched from the
//! API and cached with a TTL; if a refresh fails the stale set keeps being
//! used rather than suddenly moderating admins.

use std::{collections::HashSet, time::Duration};

use teloxide::prelude::*;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

struct CacheState {
    refreshed_at: Option<Instant>,
    admins: HashSet<u64>,
}

pub struct AdminCache {
    bot: Bot,
    group: teloxide::types::ChatId,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl AdminCache {
    pub fn new(bot: Bot, group: teloxide::types::ChatId, ttl: Duration) -> Self {
        Self {
            bot,
            group,
            ttl,
            state: Mutex::new(CacheState {
                refreshed_at: None,
                admins: HashSet::new(),
            }),
        }
    }

    pub async fn is_admin(&self, user_id: u64) -> bool {
        let mut state = self.state.lock().await;

        let stale = state
            .refreshed_at
            .map(|at| at.elapsed() >= self.ttl)
            .unwrap_or(true);

        if stale {
            match self.bot.get_chat_administrators(self.group).await {
                Ok(members) => {
                    state.admins = members.iter().map(|m| m.user.id.0).collect();
                    state.refreshed_at = Some(Instant::now());
                    debug!(count = state.admins.len(), "admin cache refreshed");
                }
                Err(e) => {
                    // Keep the stale set; moderating admins on a transient
                    // API failure is worse than a late refresh.
                    warn!(error = %e, "failed to refresh admin list");
                }
            }
        }

        state.admins.contains(&user_id)
    }
}
