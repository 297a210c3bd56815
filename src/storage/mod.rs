use crate::config::StorageConfig;
use crate::error::{MetaRetrievalError, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::{Path, PathBuf};

pub mod turns;
pub mod types;
pub use turns::{find_pair, group_turns, Turn};
pub use types::{DeletedTurn, MessageRole, NewMessage, StoredMessage};

const SELECT_COLUMNS: &str =
    "id, owner, role, content, model_name, token_usage, elapsed_time, timestamp";

/// Maps a low-level store failure to a persistence error with context
fn persistence<E: std::fmt::Display>(
    context: &'static str,
) -> impl FnOnce(E) -> MetaRetrievalError {
    move |e| MetaRetrievalError::Persistence(format!("{}: {}", context, e))
}

/// Fixed-width RFC 3339 form, so text order equals time order
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(text: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(text).map(|dt| dt.with_timezone(&Utc))
}

/// Current time truncated to the stored precision
fn now_micros() -> DateTime<Utc> {
    let now = Utc::now();
    now - Duration::nanoseconds(i64::from(now.timestamp_subsec_nanos() % 1_000))
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<StoredMessage> {
    let role_text: String = row.get(2)?;
    let role = role_text.parse::<MessageRole>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let token_usage: Option<i64> = row.get(5)?;
    let timestamp_text: String = row.get(7)?;
    let timestamp = parse_timestamp(&timestamp_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(StoredMessage {
        id: row.get(0)?,
        owner: row.get(1)?,
        role,
        content: row.get(3)?,
        model_name: row.get(4)?,
        token_usage: token_usage.map(|t| t.max(0) as usize),
        elapsed_time: row.get(6)?,
        timestamp,
    })
}

fn require_owner(owner: &str) -> Result<()> {
    if owner.trim().is_empty() {
        return Err(
            MetaRetrievalError::InvalidInput("owner identity cannot be empty".to_string()).into(),
        );
    }
    Ok(())
}

/// SQLite-backed conversation repository
///
/// Every operation is scoped to an owner identity supplied by the caller.
/// Each call opens its own connection; the single insert and the compound
/// delete are each one transaction.
pub struct SqliteConversationStore {
    db_path: PathBuf,
}

impl SqliteConversationStore {
    /// Create a new store in the user's data directory
    ///
    /// `METARETRIEVAL_HISTORY_DB` overrides the location.
    pub fn new() -> Result<Self> {
        if let Ok(override_path) = std::env::var("METARETRIEVAL_HISTORY_DB") {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("com", "metaretrieval", "metaretrieval").ok_or_else(|| {
            MetaRetrievalError::Persistence("Could not determine data directory".into())
        })?;

        Self::new_with_path(proj_dirs.data_dir().join("history.db"))
    }

    /// Open the store described by the storage configuration
    pub fn open(config: &StorageConfig) -> Result<Self> {
        match &config.path {
            Some(path) => Self::new_with_path(path.clone()),
            None => Self::new(),
        }
    }

    /// Create a new store that uses the specified database path
    ///
    /// # Examples
    ///
    /// ```
    /// use metaretrieval::storage::SqliteConversationStore;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = SqliteConversationStore::new_with_path(dir.path().join("history.db")).unwrap();
    /// assert!(store.list("alice").unwrap().is_empty());
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(persistence("Failed to create parent directory for database"))?;
        }

        let store = Self { db_path };
        store.init()?;
        Ok(store)
    }

    /// Location of the database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path).map_err(persistence("Failed to open database"))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(persistence("Failed to configure database"))?;
        Ok(conn)
    }

    fn init(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                content TEXT NOT NULL,
                model_name TEXT,
                token_usage INTEGER,
                elapsed_time REAL,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_owner_timestamp
                ON messages (owner, timestamp);",
        )
        .map_err(persistence("Failed to create tables"))?;
        Ok(())
    }

    /// Insert a message
    ///
    /// The timestamp is strictly later than any earlier message of the
    /// same owner, even when the clock has not advanced.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` on any store failure; the message was not
    /// recorded in that case
    pub fn append(&self, message: &NewMessage) -> Result<StoredMessage> {
        require_owner(&message.owner)?;

        let mut conn = self.connect()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(persistence("Failed to start transaction"))?;

        let latest: Option<String> = tx
            .query_row(
                "SELECT MAX(timestamp) FROM messages WHERE owner = ?1",
                params![message.owner],
                |row| row.get(0),
            )
            .map_err(persistence("Failed to read latest timestamp"))?;

        let mut timestamp = now_micros();
        if let Some(latest) = latest.as_deref() {
            let latest =
                parse_timestamp(latest).map_err(persistence("Corrupt timestamp in store"))?;
            if timestamp <= latest {
                timestamp = latest + Duration::microseconds(1);
            }
        }

        tx.execute(
            "INSERT INTO messages
                (owner, role, content, model_name, token_usage, elapsed_time, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.owner,
                message.role.as_str(),
                message.content,
                message.model_name,
                message.token_usage.map(|t| t as i64),
                message.elapsed_time,
                format_timestamp(&timestamp),
            ],
        )
        .map_err(persistence("Failed to insert message"))?;
        let id = tx.last_insert_rowid();

        tx.commit().map_err(persistence("Failed to commit transaction"))?;

        tracing::debug!(
            "Stored {} message {} for owner ({} chars)",
            message.role,
            id,
            message.content.len()
        );

        Ok(StoredMessage {
            id,
            owner: message.owner.clone(),
            role: message.role,
            content: message.content.clone(),
            model_name: message.model_name.clone(),
            token_usage: message.token_usage,
            elapsed_time: message.elapsed_time,
            timestamp,
        })
    }

    /// All messages of `owner`, most recent first
    ///
    /// An owner without history gets an empty list.
    pub fn list(&self, owner: &str) -> Result<Vec<StoredMessage>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM messages WHERE owner = ?1 ORDER BY timestamp DESC, id DESC",
                SELECT_COLUMNS
            ))
            .map_err(persistence("Failed to prepare statement"))?;

        let rows = stmt
            .query_map(params![owner], row_to_message)
            .map_err(persistence("Failed to query messages"))?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row.map_err(persistence("Failed to read message"))?);
        }
        Ok(messages)
    }

    /// A single message of `owner`
    pub fn get(&self, owner: &str, id: i64) -> Result<Option<StoredMessage>> {
        let conn = self.connect()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM messages WHERE id = ?1 AND owner = ?2",
                SELECT_COLUMNS
            ),
            params![id, owner],
            row_to_message,
        )
        .optional()
        .map_err(|e| persistence("Failed to query message")(e).into())
    }

    /// `owner`'s history grouped into turns, most recent first
    pub fn turns(&self, owner: &str) -> Result<Vec<Turn>> {
        Ok(group_turns(&self.list(owner)?))
    }

    /// Delete a message together with its paired assistant reply
    ///
    /// Deleting a user message also removes the earliest assistant message
    /// of the same owner with a strictly later timestamp. Deleting an
    /// assistant message removes it alone. Both deletions happen in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns `NotFoundOrForbidden` when `id` does not exist or belongs to
    /// another owner, and `Persistence` on store failure; nothing is
    /// deleted in either case
    pub fn delete_pair(&self, owner: &str, id: i64) -> Result<DeletedTurn> {
        let mut conn = self.connect()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(persistence("Failed to start transaction"))?;

        let target: Option<(String, String)> = tx
            .query_row(
                "SELECT role, timestamp FROM messages WHERE id = ?1 AND owner = ?2",
                params![id, owner],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(persistence("Failed to query message"))?;

        let Some((role, timestamp)) = target else {
            return Err(MetaRetrievalError::NotFoundOrForbidden(id).into());
        };

        let paired_assistant_id: Option<i64> = if role == MessageRole::User.as_str() {
            tx.query_row(
                "SELECT id FROM messages
                WHERE owner = ?1 AND role = 'assistant' AND timestamp > ?2
                ORDER BY timestamp ASC, id ASC
                LIMIT 1",
                params![owner, timestamp],
                |row| row.get(0),
            )
            .optional()
            .map_err(persistence("Failed to query paired message"))?
        } else {
            None
        };

        tx.execute(
            "DELETE FROM messages WHERE id = ?1 AND owner = ?2",
            params![id, owner],
        )
        .map_err(persistence("Failed to delete message"))?;

        if let Some(pair_id) = paired_assistant_id {
            tx.execute(
                "DELETE FROM messages WHERE id = ?1 AND owner = ?2",
                params![pair_id, owner],
            )
            .map_err(persistence("Failed to delete paired message"))?;
        }

        tx.commit().map_err(persistence("Failed to commit transaction"))?;

        let deleted = DeletedTurn {
            target_id: id,
            paired_assistant_id,
        };
        tracing::info!("Deleted {} message(s) starting at {}", deleted.removed(), id);
        Ok(deleted)
    }

    /// Replace the content of a stored message
    ///
    /// Only the content changes; id, role, metadata and timestamp are kept.
    ///
    /// # Errors
    ///
    /// Returns `NotFoundOrForbidden` when `id` does not exist or belongs to
    /// another owner
    pub fn update_message(&self, owner: &str, id: i64, new_content: &str) -> Result<StoredMessage> {
        let conn = self.connect()?;
        let updated = conn
            .execute(
                "UPDATE messages SET content = ?1 WHERE id = ?2 AND owner = ?3",
                params![new_content, id, owner],
            )
            .map_err(persistence("Failed to update message"))?;

        if updated == 0 {
            return Err(MetaRetrievalError::NotFoundOrForbidden(id).into());
        }

        tracing::info!("Updated content of message {}", id);
        self.get(owner, id)?
            .ok_or_else(|| MetaRetrievalError::NotFoundOrForbidden(id).into())
    }

    /// Delete every message of `owner`, returning how many were removed
    pub fn clear(&self, owner: &str) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn
            .transaction()
            .map_err(persistence("Failed to start transaction"))?;
        let removed = tx
            .execute("DELETE FROM messages WHERE owner = ?1", params![owner])
            .map_err(persistence("Failed to clear history"))?;
        tx.commit().map_err(persistence("Failed to commit transaction"))?;

        tracing::info!("Cleared {} message(s) for owner", removed);
        Ok(removed)
    }
}
