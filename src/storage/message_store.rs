use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use rusqlite::{OptionalExtension, params, params_from_iter};
use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

use crate::common::{ChatMessage, DirectoryEntry, NewMessage};
use crate::error::StoreError;

use super::database::Database;
use super::models::{MessageRow, UserRow, parse_messages};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

const MESSAGE_COLUMNS: &str = "id, text, sender, recipient, created_at, read";

/// Collections whose mutations are announced to live subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Messages,
    Users,
}

/// Shared message store backing every chat component.
///
/// Cloning is cheap; all clones share the connection and the change feed.
#[derive(Clone)]
pub struct MessageStore {
    db: Arc<Mutex<Database>>,
    changes: broadcast::Sender<Collection>,
}

impl MessageStore {
    /// Open (or create) the store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::open(path)?;
        Self::with_database(db)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_database(Database::in_memory()?)
    }

    fn with_database(db: Database) -> Result<Self, StoreError> {
        init_schema(&db)?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            changes,
        })
    }

    /// Receiver of change notices. Subscribe before reading to avoid missing
    /// a write that lands between the read and the wait.
    pub fn changes(&self) -> broadcast::Receiver<Collection> {
        self.changes.subscribe()
    }

    fn notify(&self, collection: Collection) {
        // No receivers simply means nobody is watching.
        let _ = self.changes.send(collection);
    }

    // ========== Messages ==========

    /// Append a message, assigning its id and a timestamp that is never
    /// earlier than now nor earlier than any stored message.
    pub async fn append_message(&self, message: NewMessage) -> Result<ChatMessage, StoreError> {
        if message.sender.trim().is_empty() {
            return Err(StoreError::Malformed("message without sender".to_string()));
        }
        if message.text.trim().is_empty() {
            return Err(StoreError::Malformed("message without text".to_string()));
        }

        let stored = {
            let db = self.db.lock().await;
            let conn = db.connection();
            let latest: Option<i64> =
                conn.query_row("SELECT MAX(created_at) FROM messages", [], |row| row.get(0))?;
            let now = Utc::now().timestamp_millis();
            let created_at = latest.map_or(now, |latest| now.max(latest + 1));

            let stored = ChatMessage {
                id: Uuid::new_v4().to_string(),
                text: message.text,
                sender: message.sender,
                recipient: message.recipient,
                created_at,
                read: None,
            };
            conn.execute(
                "INSERT INTO messages (id, text, sender, recipient, created_at, read)
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
                params![
                    stored.id,
                    stored.text,
                    stored.sender,
                    stored.recipient,
                    stored.created_at
                ],
            )?;
            stored
        };

        log::debug!("Stored message {} from {}", stored.id, stored.sender);
        self.notify(Collection::Messages);
        Ok(stored)
    }

    /// Insert a fully formed record (imports and fixtures). Existing ids are kept.
    pub async fn insert_message(&self, message: &ChatMessage) -> Result<bool, StoreError> {
        let inserted = {
            let db = self.db.lock().await;
            db.connection().execute(
                "INSERT OR IGNORE INTO messages (id, text, sender, recipient, created_at, read)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    message.id,
                    message.text,
                    message.sender,
                    message.recipient,
                    message.created_at,
                    message.read
                ],
            )?
        };

        if inserted > 0 {
            self.notify(Collection::Messages);
        }
        Ok(inserted > 0)
    }

    pub async fn get_message(&self, id: &str) -> Result<Option<ChatMessage>, StoreError> {
        let db = self.db.lock().await;
        let row = db
            .connection()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id],
                map_message_row,
            )
            .optional()?;

        row.map(ChatMessage::try_from).transpose()
    }

    /// Messages exchanged between `visitor` and any of `admins`, oldest first.
    ///
    /// Records without a recipient only match on the sender.
    pub async fn conversation_messages(
        &self,
        visitor: &str,
        admins: &[String],
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let admin_params = (0..admins.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");

        let db = self.db.lock().await;
        let mut stmt = db.connection().prepare_cached(&format!(
            "SELECT {MESSAGE_COLUMNS}
             FROM messages
             WHERE (sender = ?1 AND (recipient IS NULL OR recipient IN ({admin_params})))
                OR (sender IN ({admin_params}) AND (recipient IS NULL OR recipient = ?1))
             ORDER BY created_at ASC, id ASC"
        ))?;

        let values = std::iter::once(visitor).chain(admins.iter().map(String::as_str));
        let rows = stmt
            .query_map(params_from_iter(values), map_message_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(parse_messages(rows))
    }

    /// Every stored message, oldest first.
    pub async fn all_messages(&self) -> Result<Vec<ChatMessage>, StoreError> {
        let db = self.db.lock().await;
        let mut stmt = db.connection().prepare_cached(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages ORDER BY created_at ASC, id ASC"
        ))?;

        let rows = stmt
            .query_map([], map_message_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(parse_messages(rows))
    }

    /// Distinct non-blank sender identities, sorted.
    pub async fn distinct_senders(&self) -> Result<Vec<String>, StoreError> {
        let db = self.db.lock().await;
        let mut stmt = db.connection().prepare_cached(
            "SELECT DISTINCT sender FROM messages WHERE TRIM(sender) != '' ORDER BY sender",
        )?;

        let senders = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(senders)
    }

    pub async fn unread_count(&self) -> Result<usize, StoreError> {
        let db = self.db.lock().await;
        let count: i64 = db.connection().query_row(
            "SELECT COUNT(*) FROM messages WHERE read IS NULL OR read = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub async fn message_count(&self) -> Result<usize, StoreError> {
        let db = self.db.lock().await;
        let count: i64 =
            db.connection()
                .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Update the read flag, the only mutable field of a message.
    pub async fn set_read(&self, id: &str, read: bool) -> Result<(), StoreError> {
        let updated = {
            let db = self.db.lock().await;
            db.connection().execute(
                "UPDATE messages SET read = ?1 WHERE id = ?2",
                params![read, id],
            )?
        };

        if updated == 0 {
            return Err(StoreError::NotFound(format!("message {id}")));
        }
        self.notify(Collection::Messages);
        Ok(())
    }

    /// Flag every unread message as read in one transaction.
    pub async fn mark_all_read(&self) -> Result<usize, StoreError> {
        let updated = {
            let mut db = self.db.lock().await;
            let tx = db.connection_mut().transaction()?;
            let updated = tx.execute(
                "UPDATE messages SET read = 1 WHERE read IS NULL OR read = 0",
                [],
            )?;
            tx.commit()?;
            updated
        };

        if updated > 0 {
            self.notify(Collection::Messages);
        }
        Ok(updated)
    }

    // ========== Users ==========

    /// Add or update a directory entry
    pub async fn upsert_user(&self, entry: &DirectoryEntry) -> Result<(), StoreError> {
        if entry.id.trim().is_empty() {
            return Err(StoreError::Malformed("user without id".to_string()));
        }
        {
            let db = self.db.lock().await;
            db.connection().execute(
                "INSERT OR REPLACE INTO users (id, email, created_at)
                 VALUES (?1, ?2, COALESCE((SELECT created_at FROM users WHERE id = ?1), strftime('%s', 'now')))",
                params![entry.id, entry.email],
            )?;
        }
        self.notify(Collection::Users);
        Ok(())
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<DirectoryEntry>, StoreError> {
        let db = self.db.lock().await;
        let row = db
            .connection()
            .query_row(
                "SELECT id, email FROM users WHERE id = ?1",
                params![id],
                |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        email: row.get(1)?,
                    })
                },
            )
            .optional()?;

        Ok(row.map(DirectoryEntry::from))
    }
}

fn init_schema(db: &Database) -> Result<(), StoreError> {
    let conn = db.connection();

    // `read` stays NULL until the administrator flags the message.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            sender TEXT NOT NULL,
            recipient TEXT,
            created_at INTEGER NOT NULL,
            read INTEGER
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT,
            created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_messages_created_at ON messages(created_at)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages(sender)",
        [],
    )?;

    Ok(())
}

fn map_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        text: row.get(1)?,
        sender: row.get(2)?,
        recipient: row.get(3)?,
        created_at: row.get(4)?,
        read: row.get(5)?,
    })
}

#[cfg(test)]
impl MessageStore {
    /// Run raw SQL against the connection, bypassing validation.
    pub(crate) async fn execute_raw(&self, sql: &str) -> Result<usize, StoreError> {
        let db = self.db.lock().await;
        Ok(db.connection().execute(sql, [])?)
    }
}
