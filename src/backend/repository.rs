//! Conversation storage using SQLite
//!
//! Provides persistent storage for the development backend.

use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::conversation::{RawAttachment, RawConversation, RawMessage, Sender};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Attachment encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Conversation not found: {0}")]
    NotFound(String),
}

/// A conversation row with its derived summary
#[derive(Debug, Clone)]
pub struct StoredConversation {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    pub last_message: Option<String>,
    pub last_message_date: Option<String>,
    pub messages_count: i64,
}

impl From<StoredConversation> for RawConversation {
    fn from(stored: StoredConversation) -> Self {
        RawConversation {
            id: stored.id,
            user_id: None,
            title: Some(stored.title),
            last_message: stored.last_message,
            last_message_date: stored.last_message_date,
            messages_count: Some(stored.messages_count.max(0) as u32),
            created_at: Some(stored.created_at),
            updated_at: Some(stored.updated_at),
        }
    }
}

/// A stored message with metadata
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender: Sender,
    pub content: String,
    pub attachments: Vec<RawAttachment>,
    pub created_at: String,
}

impl From<StoredMessage> for RawMessage {
    fn from(stored: StoredMessage) -> Self {
        RawMessage {
            id: stored.id,
            conversation_id: Some(stored.conversation_id),
            sender: Some(stored.sender.as_wire().to_string()),
            content: Some(stored.content),
            timestamp: Some(stored.created_at),
            kind: Some("TEXT".to_string()),
            attachments: Some(stored.attachments).filter(|a| !a.is_empty()),
            read: None,
        }
    }
}

type ConversationRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    i64,
);

const CONVERSATION_SELECT: &str = r#"
    SELECT c.id, c.title, c.created_at, c.updated_at,
        (SELECT m.content FROM messages m WHERE m.conversation_id = c.id
            ORDER BY m.created_at DESC, m.rowid DESC LIMIT 1),
        (SELECT m.created_at FROM messages m WHERE m.conversation_id = c.id
            ORDER BY m.created_at DESC, m.rowid DESC LIMIT 1),
        (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id)
    FROM conversations c
"#;

fn conversation_from_row(row: ConversationRow) -> StoredConversation {
    let (id, title, created_at, updated_at, last_message, last_message_date, messages_count) = row;
    StoredConversation {
        id,
        title,
        created_at,
        updated_at,
        last_message,
        last_message_date,
        messages_count,
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering
fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Conversation and message persistence
pub struct ChatRepository {
    pool: SqlitePool,
}

impl ChatRepository {
    /// Open (or create) the SQLite database at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self, RepositoryError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let repository = Self { pool };
        repository.init_schema().await?;
        Ok(repository)
    }

    /// Create an in-memory repository
    pub async fn in_memory() -> Result<Self, RepositoryError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repository = Self { pool };
        repository.init_schema().await?;
        Ok(repository)
    }

    async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                sender TEXT NOT NULL,
                content TEXT NOT NULL,
                attachments TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                FOREIGN KEY (conversation_id) REFERENCES conversations(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All conversations, most recently updated first
    pub async fn list_conversations(&self) -> Result<Vec<StoredConversation>, RepositoryError> {
        let rows: Vec<ConversationRow> = sqlx::query_as(&format!(
            "{} ORDER BY c.updated_at DESC, c.rowid DESC",
            CONVERSATION_SELECT
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(conversation_from_row).collect())
    }

    pub async fn get_conversation(&self, id: &str) -> Result<StoredConversation, RepositoryError> {
        let row: Option<ConversationRow> =
            sqlx::query_as(&format!("{} WHERE c.id = ?", CONVERSATION_SELECT))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(conversation_from_row)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    pub async fn create_conversation(
        &self,
        title: &str,
    ) -> Result<StoredConversation, RepositoryError> {
        let id = Uuid::new_v4().to_string();
        let created_at = now();

        sqlx::query(
            r#"
            INSERT INTO conversations (id, title, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(title)
        .bind(&created_at)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        Ok(StoredConversation {
            id,
            title: title.to_string(),
            created_at: created_at.clone(),
            updated_at: created_at,
            last_message: None,
            last_message_date: None,
            messages_count: 0,
        })
    }

    /// Delete a conversation and all its messages
    pub async fn delete_conversation(&self, id: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM messages WHERE conversation_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let result = sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Messages of a conversation in chronological order
    pub async fn list_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<StoredMessage>, RepositoryError> {
        self.ensure_exists(conversation_id).await?;

        let rows: Vec<(String, String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT id, sender, content, attachments, created_at
            FROM messages
            WHERE conversation_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, sender, content, attachments, created_at)| -> Result<_, RepositoryError> {
                Ok(StoredMessage {
                    id,
                    conversation_id: conversation_id.to_string(),
                    sender: Sender::normalize(Some(sender.as_str())),
                    content,
                    attachments: serde_json::from_str(&attachments)?,
                    created_at,
                })
            })
            .collect()
    }

    /// Append a message and bump the conversation's update time
    pub async fn save_message(
        &self,
        conversation_id: &str,
        sender: Sender,
        content: &str,
        attachments: &[RawAttachment],
    ) -> Result<StoredMessage, RepositoryError> {
        self.ensure_exists(conversation_id).await?;

        let id = Uuid::new_v4().to_string();
        let created_at = now();
        let encoded = serde_json::to_string(attachments)?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, conversation_id, sender, content, attachments, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(conversation_id)
        .bind(sender.as_wire())
        .bind(content)
        .bind(&encoded)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(&created_at)
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;

        Ok(StoredMessage {
            id,
            conversation_id: conversation_id.to_string(),
            sender,
            content: content.to_string(),
            attachments: attachments.to_vec(),
            created_at,
        })
    }

    async fn ensure_exists(&self, conversation_id: &str) -> Result<(), RepositoryError> {
        let found: Option<(String,)> = sqlx::query_as("SELECT id FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await?;

        match found {
            Some(_) => Ok(()),
            None => Err(RepositoryError::NotFound(conversation_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_conversation_lifecycle() {
        let repo = ChatRepository::in_memory().await.unwrap();

        let conv = repo.create_conversation("Sprint drills").await.unwrap();
        assert_eq!(conv.messages_count, 0);

        repo.save_message(&conv.id, Sender::User, "Hello", &[]).await.unwrap();
        repo.save_message(&conv.id, Sender::Ai, "Hi there!", &[]).await.unwrap();

        let messages = repo.list_messages(&conv.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "Hello");
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[1].sender, Sender::Ai);

        let summary = repo.get_conversation(&conv.id).await.unwrap();
        assert_eq!(summary.messages_count, 2);
        assert_eq!(summary.last_message.as_deref(), Some("Hi there!"));
        assert_eq!(summary.last_message_date, Some(messages[1].created_at.clone()));

        repo.delete_conversation(&conv.id).await.unwrap();
        assert!(matches!(
            repo.get_conversation(&conv.id).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_orders_by_latest_activity() {
        let repo = ChatRepository::in_memory().await.unwrap();

        let first = repo.create_conversation("first").await.unwrap();
        let second = repo.create_conversation("second").await.unwrap();

        let ids: Vec<String> = repo
            .list_conversations()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, [second.id.clone(), first.id.clone()]);

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        repo.save_message(&first.id, Sender::User, "bump", &[]).await.unwrap();
        let ids: Vec<String> = repo
            .list_conversations()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, [first.id, second.id]);
    }

    #[tokio::test]
    async fn test_unknown_conversation() {
        let repo = ChatRepository::in_memory().await.unwrap();

        assert!(matches!(
            repo.list_messages("nope").await,
            Err(RepositoryError::NotFound(_))
        ));
        assert!(matches!(
            repo.save_message("nope", Sender::User, "x", &[]).await,
            Err(RepositoryError::NotFound(_))
        ));
        assert!(matches!(
            repo.delete_conversation("nope").await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[test]
    fn test_stored_message_wire_shape() {
        let raw = RawMessage::from(StoredMessage {
            id: "m1".into(),
            conversation_id: "c1".into(),
            sender: Sender::Ai,
            content: "hi".into(),
            attachments: Vec::new(),
            created_at: "2024-01-01T00:00:00.000000Z".into(),
        });
        assert_eq!(raw.sender.as_deref(), Some("AI"));
        assert_eq!(raw.timestamp.as_deref(), Some("2024-01-01T00:00:00.000000Z"));
        assert!(raw.attachments.is_none());
    }

    #[tokio::test]
    async fn test_attachments_persist_with_message() {
        let repo = ChatRepository::in_memory().await.unwrap();
        let conv = repo.create_conversation("Recovery").await.unwrap();
        let attachment = RawAttachment {
            id: "a1".into(),
            kind: Some("exercise".into()),
            title: Some("Foam rolling".into()),
            url: None,
        };

        let saved = repo
            .save_message(&conv.id, Sender::User, "Try this", &[attachment.clone()])
            .await
            .unwrap();
        assert_eq!(saved.attachments, [attachment.clone()]);

        let messages = repo.list_messages(&conv.id).await.unwrap();
        assert_eq!(messages[0].attachments, [attachment.clone()]);
        assert_eq!(
            RawMessage::from(messages[0].clone()).attachments,
            Some(vec![attachment])
        );
    }
}
