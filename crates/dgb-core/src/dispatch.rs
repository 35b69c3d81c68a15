//! Action dispatcher: executes moderation actions against the external API.
//!
//! Deletion is the hard guarantee; warnings and restrictions are soft.
//! Transient failures retry with bounded exponential backoff, rate-limit
//! signals back off for the indicated duration up to a maximum total wait.

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    api::{DeleteOutcome, ModerationApi},
    domain::{Action, ChatId, MessageId, UserId},
    errors::Error,
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct DispatchConfig {
    /// Attempts per API call for transient failures (the first try included).
    pub max_attempts: u32,
    /// Base delay for exponential backoff between transient retries.
    pub backoff_base: Duration,
    /// Total budget for honoring RetryAfter waits on one call.
    pub max_rate_limit_wait: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
            max_rate_limit_wait: Duration::from_secs(30),
        }
    }
}

/// What actually happened for one dispatched action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchReport {
    pub deleted: bool,
    pub warned: bool,
    pub restricted: bool,
}

pub struct Dispatcher {
    api: Arc<dyn ModerationApi>,
    cfg: DispatchConfig,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn ModerationApi>, cfg: DispatchConfig) -> Self {
        Self { api, cfg }
    }

    /// Execute one action. The delete happens first, unconditionally; warn
    /// and restrict failures never undo it.
    pub async fn dispatch(
        &self,
        chat: ChatId,
        message_id: MessageId,
        user: Option<UserId>,
        action: &Action,
    ) -> Result<DispatchReport> {
        let mut report = DispatchReport {
            deleted: false,
            warned: false,
            restricted: false,
        };

        let outcome = self
            .call_with_retry(|| self.api.delete_message(chat, message_id))
            .await?;
        if outcome == DeleteOutcome::NotFound {
            // Already gone (duplicate event or admin beat us to it). The
            // triggering condition is satisfied either way.
            debug!(chat = chat.0, msg = message_id.0, "message already deleted");
        }
        report.deleted = true;

        match action {
            Action::DeleteOnly => {}
            Action::DeleteAndWarn { text, tier } => {
                // Best-effort: a lost warning does not roll back the delete
                // or the persisted escalation.
                match self
                    .call_with_retry(|| self.api.send_message(chat, text, None))
                    .await
                {
                    Ok(_) => report.warned = true,
                    Err(e) => {
                        warn!(chat = chat.0, tier, error = %e, "failed to send warning");
                    }
                }
            }
            Action::DeleteAndRestrict { until } => {
                let Some(user) = user else {
                    warn!(chat = chat.0, "restrict requested but sender unknown");
                    return Ok(report);
                };
                self.call_with_retry(|| self.api.restrict_user(chat, user, *until))
                    .await?;
                report.restricted = true;
            }
        }

        Ok(report)
    }

    /// Retry loop shared by all outbound calls.
    ///
    /// RetryAfter waits draw from a separate budget and do not consume
    /// attempts; transient errors back off exponentially and do.
    async fn call_with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        let mut rate_limit_waited = Duration::ZERO;

        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(Error::RateLimited(d)) => {
                    if rate_limit_waited + d > self.cfg.max_rate_limit_wait {
                        return Err(Error::DispatchPermanent(format!(
                            "rate limit wait budget exceeded ({:?} + {d:?} > {:?})",
                            rate_limit_waited, self.cfg.max_rate_limit_wait
                        )));
                    }
                    debug!(wait = ?d, "rate limited, backing off");
                    sleep(d).await;
                    rate_limit_waited += d;
                }
                Err(Error::DispatchTransient(reason)) => {
                    attempt += 1;
                    if attempt >= self.cfg.max_attempts {
                        return Err(Error::DispatchPermanent(format!(
                            "transient failure persisted after {attempt} attempts: {reason}"
                        )));
                    }
                    let backoff = self.cfg.backoff_base * 2u32.saturating_pow(attempt - 1);
                    debug!(attempt, wait = ?backoff, reason, "transient failure, retrying");
                    sleep(backoff).await;
                }
                Err(other) => return Err(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageRef;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Scriptable fake API: each call pops the next scripted result for the
    /// corresponding operation.
    #[derive(Default)]
    struct FakeApi {
        delete_script: Mutex<Vec<Result<DeleteOutcome>>>,
        send_script: Mutex<Vec<Result<()>>>,
        restrict_script: Mutex<Vec<Result<()>>>,
        deletes: AtomicUsize,
        sends: AtomicUsize,
        restricts: AtomicUsize,
    }

    impl FakeApi {
        fn script_delete(&self, results: Vec<Result<DeleteOutcome>>) {
            *self.delete_script.lock().unwrap() = results;
        }

        fn script_send(&self, results: Vec<Result<()>>) {
            *self.send_script.lock().unwrap() = results;
        }

        fn script_restrict(&self, results: Vec<Result<()>>) {
            *self.restrict_script.lock().unwrap() = results;
        }

        fn pop<T>(script: &Mutex<Vec<Result<T>>>, default: impl FnOnce() -> T) -> Result<T> {
            let mut guard = script.lock().unwrap();
            if guard.is_empty() {
                Ok(default())
            } else {
                guard.remove(0)
            }
        }
    }

    #[async_trait]
    impl ModerationApi for FakeApi {
        async fn delete_message(
            &self,
            _chat: ChatId,
            _message_id: MessageId,
        ) -> Result<DeleteOutcome> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Self::pop(&self.delete_script, || DeleteOutcome::Deleted)
        }

        async fn send_message(
            &self,
            chat: ChatId,
            _text: &str,
            _reply_to: Option<MessageId>,
        ) -> Result<MessageRef> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Self::pop(&self.send_script, || ()).map(|_| MessageRef {
                chat_id: chat,
                message_id: MessageId(99),
            })
        }

        async fn restrict_user(
            &self,
            _chat: ChatId,
            _user: UserId,
            _until: DateTime<Utc>,
        ) -> Result<()> {
            self.restricts.fetch_add(1, Ordering::SeqCst);
            Self::pop(&self.restrict_script, || ())
        }
    }

    fn dispatcher(api: Arc<FakeApi>) -> Dispatcher {
        Dispatcher::new(
            api,
            DispatchConfig {
                max_attempts: 3,
                backoff_base: Duration::from_millis(1),
                max_rate_limit_wait: Duration::from_millis(200),
            },
        )
    }

    fn warn_action() -> Action {
        Action::DeleteAndWarn {
            text: "move to comments".to_string(),
            tier: 1,
        }
    }

    #[tokio::test]
    async fn already_deleted_message_is_success() {
        let api = Arc::new(FakeApi::default());
        api.script_delete(vec![Ok(DeleteOutcome::NotFound)]);

        let d = dispatcher(api.clone());
        let report = d
            .dispatch(ChatId(1), MessageId(5), Some(UserId(2)), &Action::DeleteOnly)
            .await
            .unwrap();

        assert!(report.deleted);
        assert_eq!(api.deletes.load(Ordering::SeqCst), 1);

        // Dispatching again for the same (now gone) message also succeeds.
        api.script_delete(vec![Ok(DeleteOutcome::NotFound)]);
        let report = d
            .dispatch(ChatId(1), MessageId(5), Some(UserId(2)), &Action::DeleteOnly)
            .await
            .unwrap();
        assert!(report.deleted);
    }

    #[tokio::test]
    async fn warning_failure_does_not_fail_the_dispatch() {
        let api = Arc::new(FakeApi::default());
        api.script_send(vec![
            Err(Error::DispatchTransient("boom".to_string())),
            Err(Error::DispatchTransient("boom".to_string())),
            Err(Error::DispatchTransient("boom".to_string())),
        ]);

        let d = dispatcher(api.clone());
        let report = d
            .dispatch(ChatId(1), MessageId(5), Some(UserId(2)), &warn_action())
            .await
            .unwrap();

        assert!(report.deleted);
        assert!(!report.warned);
        assert_eq!(api.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn restrict_retries_then_succeeds() {
        let api = Arc::new(FakeApi::default());
        api.script_restrict(vec![
            Err(Error::DispatchTransient("timeout".to_string())),
            Ok(()),
        ]);

        let d = dispatcher(api.clone());
        let report = d
            .dispatch(
                ChatId(1),
                MessageId(5),
                Some(UserId(2)),
                &Action::DeleteAndRestrict {
                    until: Utc::now() + chrono::Duration::hours(1),
                },
            )
            .await
            .unwrap();

        assert!(report.restricted);
        assert_eq!(api.restricts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn restrict_exhausts_retries_into_permanent_error() {
        let api = Arc::new(FakeApi::default());
        api.script_restrict(vec![
            Err(Error::DispatchTransient("a".to_string())),
            Err(Error::DispatchTransient("b".to_string())),
            Err(Error::DispatchTransient("c".to_string())),
        ]);

        let d = dispatcher(api.clone());
        let err = d
            .dispatch(
                ChatId(1),
                MessageId(5),
                Some(UserId(2)),
                &Action::DeleteAndRestrict {
                    until: Utc::now() + chrono::Duration::hours(1),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DispatchPermanent(_)));
        assert_eq!(api.restricts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rate_limit_waits_then_retries_once() {
        let api = Arc::new(FakeApi::default());
        let wait = Duration::from_millis(50);
        api.script_delete(vec![
            Err(Error::RateLimited(wait)),
            Ok(DeleteOutcome::Deleted),
        ]);

        let d = dispatcher(api.clone());
        let started = Instant::now();
        let report = d
            .dispatch(ChatId(1), MessageId(5), Some(UserId(2)), &Action::DeleteOnly)
            .await
            .unwrap();

        assert!(report.deleted);
        assert!(started.elapsed() >= wait, "dispatcher must honor RetryAfter");
        assert_eq!(api.deletes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rate_limit_budget_exceeded_is_permanent() {
        let api = Arc::new(FakeApi::default());
        api.script_delete(vec![Err(Error::RateLimited(Duration::from_secs(60)))]);

        let d = dispatcher(api.clone());
        let err = d
            .dispatch(ChatId(1), MessageId(5), Some(UserId(2)), &Action::DeleteOnly)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DispatchPermanent(_)));
        assert_eq!(api.deletes.load(Ordering::SeqCst), 1);
    }
}
