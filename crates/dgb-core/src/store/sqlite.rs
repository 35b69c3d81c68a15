use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::info;

use crate::{
    domain::{ChatId, UserId, ViolationRecord},
    errors::Error,
    store::{CasOutcome, ViolationStore},
    Result,
};

/// SQLite-backed violation store.
///
/// One connection guarded by a mutex; writes are conditional UPDATE/INSERT
/// statements whose affected-row count realizes compare-and-swap. The
/// monotonic `count` doubles as the record version.
pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database. Failure here is fatal at startup: the
    /// process must not start accepting messages without durable state.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Connection::open(path).map_err(|e| {
            Error::StoreUnavailable(format!("opening database at {}: {e}", path.display()))
        })?;

        // WAL for concurrent read access.
        db.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(store_err)?;

        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS violations (
                chat_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                count INTEGER NOT NULL,
                last_violation_at TEXT NOT NULL,
                muted_until TEXT,
                PRIMARY KEY (chat_id, user_id)
            );",
        )
        .map_err(store_err)?;

        info!(path = %path.display(), "violation store initialized");

        Ok(Self { db: Mutex::new(db) })
    }
}

#[async_trait]
impl ViolationStore for SqliteStore {
    async fn get(&self, chat: ChatId, user: UserId) -> Result<Option<ViolationRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db
            .prepare_cached(
                "SELECT count, last_violation_at, muted_until FROM violations
                 WHERE chat_id = ?1 AND user_id = ?2",
            )
            .map_err(store_err)?;

        stmt.query_row(params![chat.0, user.0], row_to_record)
            .optional()
            .map_err(store_err)?
            .transpose()
    }

    async fn compare_and_swap(
        &self,
        chat: ChatId,
        user: UserId,
        expected: Option<&ViolationRecord>,
        new: &ViolationRecord,
    ) -> Result<CasOutcome> {
        let db = self.db.lock().await;

        let changed = match expected {
            None => db
                .execute(
                    "INSERT INTO violations (chat_id, user_id, count, last_violation_at, muted_until)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(chat_id, user_id) DO NOTHING",
                    params![
                        chat.0,
                        user.0,
                        new.count,
                        new.last_violation_at.to_rfc3339(),
                        new.muted_until.map(|t| t.to_rfc3339()),
                    ],
                )
                .map_err(store_err)?,
            Some(exp) => db
                .execute(
                    "UPDATE violations
                     SET count = ?3, last_violation_at = ?4, muted_until = ?5
                     WHERE chat_id = ?1 AND user_id = ?2 AND count = ?6",
                    params![
                        chat.0,
                        user.0,
                        new.count,
                        new.last_violation_at.to_rfc3339(),
                        new.muted_until.map(|t| t.to_rfc3339()),
                        exp.count,
                    ],
                )
                .map_err(store_err)?,
        };

        if changed == 1 {
            Ok(CasOutcome::Stored)
        } else {
            Ok(CasOutcome::Conflict)
        }
    }

    async fn reset(&self, chat: ChatId, user: UserId) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "DELETE FROM violations WHERE chat_id = ?1 AND user_id = ?2",
            params![chat.0, user.0],
        )
        .map_err(store_err)?;
        Ok(())
    }

    async fn all(&self, chat: ChatId) -> Result<Vec<(UserId, ViolationRecord)>> {
        let db = self.db.lock().await;
        let mut stmt = db
            .prepare_cached(
                "SELECT user_id, count, last_violation_at, muted_until FROM violations
                 WHERE chat_id = ?1 ORDER BY count DESC, user_id ASC",
            )
            .map_err(store_err)?;

        let rows = stmt
            .query_map(params![chat.0], |row| {
                let user: i64 = row.get(0)?;
                let count: u32 = row.get(1)?;
                let last: String = row.get(2)?;
                let muted: Option<String> = row.get(3)?;
                Ok((user, count, last, muted))
            })
            .map_err(store_err)?;

        let mut out = Vec::new();
        for row in rows {
            let (user, count, last, muted) = row.map_err(store_err)?;
            out.push((
                UserId(user),
                ViolationRecord {
                    count,
                    last_violation_at: parse_ts(&last)?,
                    muted_until: muted.as_deref().map(parse_ts).transpose()?,
                },
            ));
        }
        Ok(out)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<ViolationRecord>> {
    let count: u32 = row.get(0)?;
    let last: String = row.get(1)?;
    let muted: Option<String> = row.get(2)?;

    Ok((|| {
        Ok(ViolationRecord {
            count,
            last_violation_at: parse_ts(&last)?,
            muted_until: muted.as_deref().map(parse_ts).transpose()?,
        })
    })())
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::StoreUnavailable(format!("corrupt timestamp {s:?}: {e}")))
}

fn store_err(e: rusqlite::Error) -> Error {
    Error::StoreUnavailable(e.to_string())
}
