//! Durable violation state.
//!
//! The store is the single source of truth for escalation state and the only
//! shared mutable resource in the system. It never serializes callers;
//! correctness under concurrent updates to one key comes from
//! compare-and-swap, driven by the coordinator's retry loop.

use async_trait::async_trait;

use crate::{
    domain::{ChatId, UserId, ViolationRecord},
    Result,
};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Result of a conditional write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CasOutcome {
    Stored,
    /// The stored value no longer matches `expected`; re-read and retry.
    Conflict,
}

#[async_trait]
pub trait ViolationStore: Send + Sync {
    /// `Ok(None)` means no record (count = 0 semantically). Store failures
    /// surface as `Error::StoreUnavailable`, never as absence.
    async fn get(&self, chat: ChatId, user: UserId) -> Result<Option<ViolationRecord>>;

    /// Write `new` only if the current value still matches `expected`
    /// (`None` = record must be absent).
    async fn compare_and_swap(
        &self,
        chat: ChatId,
        user: UserId,
        expected: Option<&ViolationRecord>,
        new: &ViolationRecord,
    ) -> Result<CasOutcome>;

    /// Administrative clear; the only sanctioned way a count goes down.
    async fn reset(&self, chat: ChatId, user: UserId) -> Result<()>;

    /// All records for one chat, for the admin stats command.
    async fn all(&self, chat: ChatId) -> Result<Vec<(UserId, ViolationRecord)>>;
}
