//! Database module for `HealthBot`
//!
//! Provides persistence for conversation checkpoints and chat transcripts.

mod schema;

pub use schema::*;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("State serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Checkpoint for {session_id} changed concurrently (expected version {expected:?}, found {found:?})")]
    VersionConflict {
        session_id: String,
        expected: Option<u64>,
        found: Option<u64>,
    },
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Checkpoint Operations ====================

    /// Load the latest checkpoint for a session, if one exists
    pub fn load_checkpoint(&self, session_id: &str) -> DbResult<Option<Checkpoint>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT state, version FROM checkpoints WHERE session_id = ?1",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((state_json, version)) = row else {
            return Ok(None);
        };
        Ok(Some(Checkpoint {
            state: serde_json::from_str(&state_json)?,
            version: version_from_sql(version),
        }))
    }

    /// Write a checkpoint and return its new version.
    ///
    /// `expected_version` is the version the caller loaded: `None` creates
    /// the row, `Some(v)` replaces it only if it is still at `v`. Any other
    /// writer in between yields [`DbError::VersionConflict`].
    pub fn store_checkpoint(
        &self,
        session_id: &str,
        state: &ConversationState,
        expected_version: Option<u64>,
    ) -> DbResult<u64> {
        let state_json = serde_json::to_string(state)?;
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();

        let written = match expected_version {
            None => conn.execute(
                "INSERT INTO checkpoints (session_id, state, version, created_at, updated_at)
                 VALUES (?1, ?2, 1, ?3, ?3)
                 ON CONFLICT(session_id) DO NOTHING",
                params![session_id, state_json, now],
            )?,
            Some(expected) => conn.execute(
                "UPDATE checkpoints SET state = ?1, version = version + 1, updated_at = ?2
                 WHERE session_id = ?3 AND version = ?4",
                params![state_json, now, session_id, version_to_sql(expected)],
            )?,
        };

        if written == 0 {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT version FROM checkpoints WHERE session_id = ?1",
                    params![session_id],
                    |row| row.get(0),
                )
                .optional()?;
            return Err(DbError::VersionConflict {
                session_id: session_id.to_string(),
                expected: expected_version,
                found: found.map(version_from_sql),
            });
        }

        Ok(expected_version.map_or(1, |v| v + 1))
    }

    // ==================== Chat Message Operations ====================

    /// Append a message to a session's chat transcript
    pub fn add_chat_message(
        &self,
        message_id: &str,
        session_id: &str,
        role: ChatRole,
        content: &str,
    ) -> DbResult<ChatMessage> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        // Get next sequence ID
        let sequence_id: i64 = conn.query_row(
            "SELECT COALESCE(MAX(sequence_id), 0) + 1 FROM chat_messages WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;

        conn.execute(
            "INSERT INTO chat_messages (message_id, session_id, sequence_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message_id,
                session_id,
                sequence_id,
                role.to_string(),
                content,
                now.to_rfc3339(),
            ],
        )?;

        Ok(ChatMessage {
            message_id: message_id.to_string(),
            session_id: session_id.to_string(),
            sequence_id,
            role,
            content: content.to_string(),
            created_at: now,
        })
    }

    /// Get a session's chat transcript in order
    pub fn get_chat_messages(&self, session_id: &str) -> DbResult<Vec<ChatMessage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT message_id, session_id, sequence_id, role, content, created_at
             FROM chat_messages WHERE session_id = ?1 ORDER BY sequence_id ASC",
        )?;

        let rows = stmt.query_map(params![session_id], parse_chat_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    // ==================== Retention ====================

    /// Delete checkpoints last written, and messages created, before `cutoff`
    pub fn purge_older_than(&self, cutoff: DateTime<Utc>) -> DbResult<PurgeStats> {
        let conn = self.conn.lock().unwrap();
        let cutoff = cutoff.to_rfc3339();
        let checkpoints = conn.execute("DELETE FROM checkpoints WHERE updated_at < ?1", params![cutoff])?;
        let messages = conn.execute("DELETE FROM chat_messages WHERE created_at < ?1", params![cutoff])?;
        Ok(PurgeStats { checkpoints, messages })
    }
}

fn version_to_sql(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

fn version_from_sql(version: i64) -> u64 {
    u64::try_from(version).unwrap_or_default()
}

/// Parse a chat message row from the database
fn parse_chat_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        message_id: row.get(0)?,
        session_id: row.get(1)?,
        sequence_id: row.get(2)?,
        role: parse_chat_role(&row.get::<_, String>(3)?),
        content: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn parse_chat_role(s: &str) -> ChatRole {
    match s {
        "user" => ChatRole::User,
        _ => ChatRole::Bot,
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
