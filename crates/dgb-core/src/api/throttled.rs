use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    api::port::{DeleteOutcome, ModerationApi},
    domain::{ChatId, MessageId, MessageRef, UserId},
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* outbound API calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls per chat (Telegram 1 msg/sec style limits).
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// ModerationApi decorator enforcing a process-wide rate budget shared
/// across all dispatch calls. Best-effort: it reduces 429s rather than
/// guaranteeing their absence; the dispatcher still honors RetryAfter.
pub struct ThrottledApi {
    inner: Arc<dyn ModerationApi>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<HashMap<i64, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledApi {
    pub fn new(inner: Arc<dyn ModerationApi>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_chat(&self, chat_id: i64) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_chat.lock().await;
        map.entry(chat_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_chat_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_chat(&self, chat_id: i64) {
        let global_wait = { self.global.lock().await.reserve() };
        let chat_wait = {
            let lim = self.limiter_for_chat(chat_id).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = if global_wait > chat_wait {
            global_wait
        } else {
            chat_wait
        };
        if wait > Duration::from_millis(0) {
            sleep(wait).await;
        }
    }
}

#[async_trait]
impl ModerationApi for ThrottledApi {
    async fn delete_message(&self, chat: ChatId, message_id: MessageId) -> Result<DeleteOutcome> {
        self.throttle_chat(chat.0).await;
        self.inner.delete_message(chat, message_id).await
    }

    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        self.throttle_chat(chat.0).await;
        self.inner.send_message(chat, text, reply_to).await
    }

    async fn restrict_user(&self, chat: ChatId, user: UserId, until: DateTime<Utc>) -> Result<()> {
        self.throttle_chat(chat.0).await;
        self.inner.restrict_user(chat, user, until).await
    }
}
