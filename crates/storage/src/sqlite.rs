//! SQLite message store.
//!
//! A single database file with three tables:
//! - `conversations` — one row per chat session
//! - `messages` — request/response rows; role is derived from `request_id`,
//!   never stored
//! - `usage_details` — one row per model call that contributed to a message
//!
//! Timestamps are stored as RFC 3339 text.

use async_trait::async_trait;
use chrono::Utc;
use shelftalk_core::error::StorageError;
use shelftalk_core::message::{
    Conversation, ConversationId, MessageId, MessagePage, MessageUsage, NewMessage, StoredMessage,
};
use shelftalk_core::repository::Repository;
use shelftalk_core::usage::ScopedUsage;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// A durable SQLite repository.
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Create a new SQLite repository from a file path.
    ///
    /// The database and all tables are created automatically.
    /// Pass `":memory:"` for an in-process ephemeral database.
    pub async fn new(path: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StorageError::Backend(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to open SQLite: {e}")))?;

        let repo = Self { pool };
        repo.run_migrations().await?;
        info!("SQLite repository initialized at {path}");
        Ok(repo)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        let repo = Self { pool };
        repo.run_migrations().await?;
        Ok(repo)
    }

    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                title      TEXT,
                summary    TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("conversations table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL,
                request_id      INTEGER,
                text            TEXT NOT NULL,
                summary         TEXT,
                input_tokens    INTEGER,
                output_tokens   INTEGER,
                cached_tokens   INTEGER,
                model           TEXT,
                price           REAL,
                created_at      TEXT NOT NULL,
                FOREIGN KEY(conversation_id) REFERENCES conversations(id) ON DELETE CASCADE,
                FOREIGN KEY(request_id) REFERENCES messages(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usage_details (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id    INTEGER NOT NULL,
                scope         TEXT NOT NULL,
                model         TEXT NOT NULL,
                input_tokens  INTEGER NOT NULL DEFAULT 0,
                output_tokens INTEGER NOT NULL DEFAULT 0,
                cached_tokens INTEGER NOT NULL DEFAULT 0,
                price         REAL NOT NULL DEFAULT 0.0,
                created_at    TEXT NOT NULL,
                FOREIGN KEY(message_id) REFERENCES messages(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("usage_details table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation \
             ON messages(conversation_id, id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("messages index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> Result<Conversation, StorageError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| StorageError::QueryFailed(format!("id column: {e}")))?;
        let title: Option<String> = row
            .try_get("title")
            .map_err(|e| StorageError::QueryFailed(format!("title column: {e}")))?;
        let summary: Option<String> = row
            .try_get("summary")
            .map_err(|e| StorageError::QueryFailed(format!("summary column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StorageError::QueryFailed(format!("created_at column: {e}")))?;

        Ok(Conversation {
            id,
            title,
            summary,
            created_at: parse_timestamp(&created_at_str),
        })
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<StoredMessage, StorageError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| StorageError::QueryFailed(format!("id column: {e}")))?;
        let conversation_id: i64 = row
            .try_get("conversation_id")
            .map_err(|e| StorageError::QueryFailed(format!("conversation_id column: {e}")))?;
        let request_id: Option<i64> = row
            .try_get("request_id")
            .map_err(|e| StorageError::QueryFailed(format!("request_id column: {e}")))?;
        let text: String = row
            .try_get("text")
            .map_err(|e| StorageError::QueryFailed(format!("text column: {e}")))?;
        let summary: Option<String> = row
            .try_get("summary")
            .map_err(|e| StorageError::QueryFailed(format!("summary column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StorageError::QueryFailed(format!("created_at column: {e}")))?;

        // Usage is present once a model has been attributed.
        let model: Option<String> = row
            .try_get("model")
            .map_err(|e| StorageError::QueryFailed(format!("model column: {e}")))?;
        let usage = match model {
            Some(model) => {
                let input_tokens: Option<i64> = row.try_get("input_tokens").unwrap_or(None);
                let output_tokens: Option<i64> = row.try_get("output_tokens").unwrap_or(None);
                let cached_tokens: Option<i64> = row.try_get("cached_tokens").unwrap_or(None);
                let price: Option<f64> = row.try_get("price").unwrap_or(None);
                Some(MessageUsage {
                    input_tokens: input_tokens.unwrap_or(0) as u32,
                    output_tokens: output_tokens.unwrap_or(0) as u32,
                    cached_tokens: cached_tokens.unwrap_or(0) as u32,
                    model,
                    price: price.unwrap_or(0.0),
                })
            }
            None => None,
        };

        Ok(StoredMessage {
            id,
            conversation_id,
            request_id,
            text,
            summary,
            usage,
            created_at: parse_timestamp(&created_at_str),
        })
    }

    /// Enforce the request-link invariant before inserting a response.
    async fn validate_request_link(
        &self,
        conversation_id: ConversationId,
        request_id: MessageId,
    ) -> Result<(), StorageError> {
        let row = sqlx::query("SELECT conversation_id, request_id FROM messages WHERE id = ?")
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("request lookup: {e}")))?;

        let invalid = StorageError::InvalidRequestLink {
            request_id,
            conversation_id,
        };

        let Some(row) = row else {
            return Err(invalid);
        };
        let req_conversation: i64 = row
            .try_get("conversation_id")
            .map_err(|e| StorageError::QueryFailed(format!("conversation_id column: {e}")))?;
        let req_request_id: Option<i64> = row
            .try_get("request_id")
            .map_err(|e| StorageError::QueryFailed(format!("request_id column: {e}")))?;

        // The referenced message must be a user message in this conversation.
        if req_conversation != conversation_id || req_request_id.is_some() {
            return Err(invalid);
        }
        Ok(())
    }
}

fn parse_timestamp(s: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl Repository for SqliteRepository {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_conversation(
        &self,
        title: Option<String>,
        summary: Option<String>,
    ) -> Result<Conversation, StorageError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO conversations (title, summary, created_at) VALUES (?, ?, ?)",
        )
        .bind(&title)
        .bind(&summary)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("insert conversation: {e}")))?;

        Ok(Conversation {
            id: result.last_insert_rowid(),
            title,
            summary,
            created_at: now,
        })
    }

    async fn get_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, StorageError> {
        let row = sqlx::query("SELECT id, title, summary, created_at FROM conversations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("select conversation: {e}")))?;

        row.as_ref().map(Self::row_to_conversation).transpose()
    }

    async fn create_message(&self, message: NewMessage) -> Result<StoredMessage, StorageError> {
        if let Some(request_id) = message.request_id {
            self.validate_request_link(message.conversation_id, request_id)
                .await?;
        }

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO messages (conversation_id, request_id, text, summary, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(message.conversation_id)
        .bind(message.request_id)
        .bind(&message.text)
        .bind(&message.summary)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("insert message: {e}")))?;

        Ok(StoredMessage {
            id: result.last_insert_rowid(),
            conversation_id: message.conversation_id,
            request_id: message.request_id,
            text: message.text,
            summary: message.summary,
            usage: None,
            created_at: now,
        })
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        offset: u64,
        limit: u64,
    ) -> Result<MessagePage, StorageError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = ?")
                .bind(conversation_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| StorageError::QueryFailed(format!("count messages: {e}")))?;

        let rows = sqlx::query(
            "SELECT id, conversation_id, request_id, text, summary, \
                    input_tokens, output_tokens, cached_tokens, model, price, created_at \
             FROM messages WHERE conversation_id = ? \
             ORDER BY id ASC LIMIT ? OFFSET ?",
        )
        .bind(conversation_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("select messages: {e}")))?;

        let items = rows
            .iter()
            .map(Self::row_to_message)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MessagePage {
            items,
            total: total as u64,
            offset,
            limit,
        })
    }

    async fn set_message_usage(
        &self,
        message_id: MessageId,
        usage: &MessageUsage,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE messages \
             SET input_tokens = ?, output_tokens = ?, cached_tokens = ?, model = ?, price = ? \
             WHERE id = ?",
        )
        .bind(usage.input_tokens as i64)
        .bind(usage.output_tokens as i64)
        .bind(usage.cached_tokens as i64)
        .bind(&usage.model)
        .bind(usage.price)
        .bind(message_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("update usage: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn add_usage_detail(
        &self,
        message_id: MessageId,
        detail: &ScopedUsage,
        price: f64,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO usage_details \
             (message_id, scope, model, input_tokens, output_tokens, cached_tokens, price, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(message_id)
        .bind(detail.scope.to_string())
        .bind(&detail.usage.model)
        .bind(detail.usage.input_tokens as i64)
        .bind(detail.usage.output_tokens as i64)
        .bind(detail.usage.cached_tokens as i64)
        .bind(price)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("insert usage detail: {e}")))?;

        Ok(())
    }
}
