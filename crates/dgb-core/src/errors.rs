use std::time::Duration;

/// Core error type for the moderation engine.
///
/// The adapter crate maps its transport-specific errors into this type so the
/// dispatcher can tell retryable failures (rate limits, network blips) from
/// permanent ones without knowing which API it is talking to.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// The store could not be reached or the query failed. Distinct from
    /// "record absent", which is a successful `Ok(None)` read.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Compare-and-swap retries exhausted for a single (chat, user) key.
    #[error("store conflict for chat {chat} user {user} after {attempts} attempts")]
    StoreConflict {
        chat: i64,
        user: i64,
        attempts: u32,
    },

    /// The API asked us to back off for the given duration.
    #[error("rate limited, retry after {0:?}")]
    RateLimited(Duration),

    #[error("transient dispatch failure: {0}")]
    DispatchTransient(String),

    #[error("dispatch failed: {0}")]
    DispatchPermanent(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
