use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{ChatId, UserId, ViolationRecord},
    store::{CasOutcome, ViolationStore},
    Result,
};

/// In-memory store with the same compare-and-swap semantics as the SQLite
/// one. Used by tests; not durable.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<(i64, i64), ViolationRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ViolationStore for MemoryStore {
    async fn get(&self, chat: ChatId, user: UserId) -> Result<Option<ViolationRecord>> {
        let map = self.records.lock().await;
        Ok(map.get(&(chat.0, user.0)).cloned())
    }

    async fn compare_and_swap(
        &self,
        chat: ChatId,
        user: UserId,
        expected: Option<&ViolationRecord>,
        new: &ViolationRecord,
    ) -> Result<CasOutcome> {
        let mut map = self.records.lock().await;
        let key = (chat.0, user.0);
        let current = map.get(&key);

        let matches = match (current, expected) {
            (None, None) => true,
            (Some(cur), Some(exp)) => cur.count == exp.count,
            _ => false,
        };

        if !matches {
            return Ok(CasOutcome::Conflict);
        }

        map.insert(key, new.clone());
        Ok(CasOutcome::Stored)
    }

    async fn reset(&self, chat: ChatId, user: UserId) -> Result<()> {
        let mut map = self.records.lock().await;
        map.remove(&(chat.0, user.0));
        Ok(())
    }

    async fn all(&self, chat: ChatId) -> Result<Vec<(UserId, ViolationRecord)>> {
        let map = self.records.lock().await;
        let mut out: Vec<_> = map
            .iter()
            .filter(|((c, _), _)| *c == chat.0)
            .map(|((_, u), rec)| (UserId(*u), rec.clone()))
            .collect();
        out.sort_by(|(ua, ra), (ub, rb)| rb.count.cmp(&ra.count).then(ua.0.cmp(&ub.0)));
        Ok(out)
    }
}
