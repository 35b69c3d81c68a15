//! Per-message orchestration: classify, escalate, persist, dispatch.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::{
    classify::{classify, ChannelBinding},
    dispatch::{DispatchReport, Dispatcher},
    domain::{Action, InboundMessage, Verdict},
    errors::Error,
    formatting::render_warning,
    policy::EscalationTable,
    store::{CasOutcome, ViolationStore},
    Result,
};

const CAS_MAX_ATTEMPTS: u32 = 5;

/// Outcome of handling one inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandleOutcome {
    Legitimate,
    Enforced {
        count: u32,
        action: Action,
        report: DispatchReport,
    },
}

/// Orchestrates one message through the pipeline. All collaborators are
/// injected at construction; the coordinator itself is stateless and can be
/// shared across any number of concurrent invocations.
pub struct Coordinator {
    binding: ChannelBinding,
    table: EscalationTable,
    store: Arc<dyn ViolationStore>,
    dispatcher: Dispatcher,
}

impl Coordinator {
    pub fn new(
        binding: ChannelBinding,
        table: EscalationTable,
        store: Arc<dyn ViolationStore>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            binding,
            table,
            store,
            dispatcher,
        }
    }

    /// Received -> Classified -> (Legitimate | StateUpdated -> Dispatched).
    ///
    /// A dispatch failure after the state update propagates, but the
    /// escalation stays recorded: deletion is at-least-recorded,
    /// best-effort-enforced.
    pub async fn handle(&self, msg: &InboundMessage) -> Result<HandleOutcome> {
        if classify(msg, &self.binding) == Verdict::Legitimate {
            debug!(
                chat = msg.chat_id.0,
                msg_id = msg.message_id.0,
                "legitimate comment, ignoring"
            );
            return Ok(HandleOutcome::Legitimate);
        }

        let Some(sender) = &msg.sender else {
            // Anonymous violation (no sender to attribute): delete only,
            // nothing to escalate against.
            let report = self
                .dispatcher
                .dispatch(msg.chat_id, msg.message_id, None, &Action::DeleteOnly)
                .await?;
            return Ok(HandleOutcome::Enforced {
                count: 0,
                action: Action::DeleteOnly,
                report,
            });
        };

        // Hold `now` fixed across CAS retries so recomputation is idempotent.
        let now = Utc::now();
        let (record, action) = {
            let mut attempts = 0u32;
            loop {
                let current = self.store.get(msg.chat_id, sender.id).await?;
                let (next, action) = self.table.next(current.as_ref(), now);
                match self
                    .store
                    .compare_and_swap(msg.chat_id, sender.id, current.as_ref(), &next)
                    .await?
                {
                    CasOutcome::Stored => break (next, action),
                    CasOutcome::Conflict => {
                        attempts += 1;
                        if attempts >= CAS_MAX_ATTEMPTS {
                            return Err(Error::StoreConflict {
                                chat: msg.chat_id.0,
                                user: sender.id.0,
                                attempts,
                            });
                        }
                        debug!(
                            chat = msg.chat_id.0,
                            user = sender.id.0,
                            attempts,
                            "cas conflict, re-reading"
                        );
                    }
                }
            }
        };

        let action = match action {
            Action::DeleteAndWarn { text, tier } => Action::DeleteAndWarn {
                text: render_warning(&text, Some(sender)),
                tier,
            },
            other => other,
        };

        info!(
            chat = msg.chat_id.0,
            user = sender.id.0,
            msg_id = msg.message_id.0,
            count = record.count,
            action = action.kind(),
            "violation"
        );

        let report = self
            .dispatcher
            .dispatch(msg.chat_id, msg.message_id, Some(sender.id), &action)
            .await?;

        Ok(HandleOutcome::Enforced {
            count: record.count,
            action,
            report,
        })
    }

    pub fn store(&self) -> &Arc<dyn ViolationStore> {
        &self.store
    }
}
