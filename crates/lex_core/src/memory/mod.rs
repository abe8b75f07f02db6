//! Bounded per-user conversation history.
//!
//! Each user maps to one serialized [`UserMemory`] row in SQLite, so the store
//! behaves as a durable key-value mapping. Appends run inside a transaction and
//! evict the oldest records once the configured capacity is exceeded.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::config::MemoryConfig;
use crate::error::{codes, AppError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationRecord {
    pub timestamp: String,
    pub query: String,
    pub truncated_response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserMemory {
    pub user_id: String,
    pub first_interaction: String,
    pub records: VecDeque<ConversationRecord>,
}

impl UserMemory {
    fn new(user_id: &str, at: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            first_interaction: at.to_string(),
            records: VecDeque::new(),
        }
    }

    /// Push a record, evicting from the front until `capacity` holds.
    fn push_bounded(&mut self, record: ConversationRecord, capacity: usize) {
        self.records.push_back(record);
        while self.records.len() > capacity {
            self.records.pop_front();
        }
    }
}

pub struct MemoryStore {
    conn: Mutex<Connection>,
    settings: MemoryConfig,
}

impl MemoryStore {
    pub fn open(path: &Path, settings: MemoryConfig) -> Result<Self, AppError> {
        let mut conn = crate::db::open(path)?;
        crate::db::migrate(&mut conn)?;
        Ok(Self::from_connection(conn, settings))
    }

    pub fn open_in_memory(settings: MemoryConfig) -> Result<Self, AppError> {
        let mut conn = crate::db::open_in_memory()?;
        crate::db::migrate(&mut conn)?;
        Ok(Self::from_connection(conn, settings))
    }

    /// Wrap an already-migrated connection.
    pub fn from_connection(conn: Connection, settings: MemoryConfig) -> Self {
        Self {
            conn: Mutex::new(conn),
            settings,
        }
    }

    pub fn settings(&self) -> &MemoryConfig {
        &self.settings
    }

    fn lock(&self, code: &str) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.conn
            .lock()
            .map_err(|_| AppError::new(code, "Memory store lock poisoned"))
    }

    /// Append one exchange for `user_id`, creating the user's history on first contact.
    pub fn append(
        &self,
        user_id: &str,
        query: &str,
        response: &str,
        at: &str,
    ) -> Result<UserMemory, AppError> {
        if user_id.trim().is_empty() {
            return Err(AppError::new(
                codes::MEMORY_WRITE_FAILED,
                "User id must not be empty",
            ));
        }

        let mut conn = self.lock(codes::MEMORY_WRITE_FAILED)?;
        let tx = conn.transaction().map_err(write_err("Failed to start memory transaction"))?;

        let existing = load(&tx, user_id).map_err(|e| {
            AppError::new(codes::MEMORY_WRITE_FAILED, "Failed to load user memory before append")
                .with_details(e.details.unwrap_or(e.message))
        })?;
        let mut memory = existing.unwrap_or_else(|| UserMemory::new(user_id, at));

        memory.push_bounded(
            ConversationRecord {
                timestamp: at.to_string(),
                query: query.to_string(),
                truncated_response: truncate_chars(response, self.settings.response_chars),
            },
            self.settings.capacity,
        );

        let records_json = serde_json::to_string(&memory.records)
            .map_err(write_err("Failed to encode conversation records"))?;
        tx.execute(
            r#"
            INSERT INTO user_memory(user_id, first_interaction, records_json, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
              records_json = excluded.records_json,
              updated_at = excluded.updated_at
            "#,
            rusqlite::params![memory.user_id, memory.first_interaction, records_json, at],
        )
        .map_err(write_err("Failed to write user memory"))?;
        tx.commit().map_err(write_err("Failed to commit user memory"))?;

        tracing::debug!(user_id, records = memory.records.len(), "memory appended");
        Ok(memory)
    }

    pub fn read(&self, user_id: &str) -> Result<Option<UserMemory>, AppError> {
        let conn = self.lock(codes::MEMORY_READ_FAILED)?;
        load(&conn, user_id)
    }

    /// Remove a user's history. Returns whether anything was deleted.
    pub fn clear(&self, user_id: &str) -> Result<bool, AppError> {
        let conn = self.lock(codes::MEMORY_WRITE_FAILED)?;
        let n = conn
            .execute("DELETE FROM user_memory WHERE user_id = ?1", [user_id])
            .map_err(write_err("Failed to clear user memory"))?;
        Ok(n > 0)
    }

    pub fn user_count(&self) -> Result<u64, AppError> {
        let conn = self.lock(codes::MEMORY_READ_FAILED)?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM user_memory", [], |row| row.get(0))
            .map_err(|e| {
                AppError::new(codes::MEMORY_READ_FAILED, "Failed to count users")
                    .with_details(e.to_string())
            })?;
        Ok(n.max(0) as u64)
    }
}

fn load(conn: &Connection, user_id: &str) -> Result<Option<UserMemory>, AppError> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT first_interaction, records_json FROM user_memory WHERE user_id = ?1",
            [user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|e| {
            AppError::new(codes::MEMORY_READ_FAILED, "Failed to read user memory")
                .with_details(e.to_string())
        })?;

    let Some((first_interaction, records_json)) = row else {
        return Ok(None);
    };
    let records: VecDeque<ConversationRecord> = serde_json::from_str(&records_json).map_err(|e| {
        AppError::new(codes::MEMORY_READ_FAILED, "Failed to decode conversation records")
            .with_details(format!("user_id={user_id}; err={e}"))
    })?;
    Ok(Some(UserMemory {
        user_id: user_id.to_string(),
        first_interaction,
        records,
    }))
}

fn write_err<E: std::fmt::Display>(message: &'static str) -> impl Fn(E) -> AppError {
    move |e| AppError::new(codes::MEMORY_WRITE_FAILED, message).with_details(e.to_string())
}

/// Truncate to at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
