//! Relational store contract and its Postgres implementation.

use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::{self, PgPool, Row};

use crate::models::{Message, User};

/// Fields required to persist a newly-fetched message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub user_id: i32,
    pub provider_message_id: String,
    pub sender: String,
    pub subject: String,
    pub snippet: String,
    pub body: String,
    pub date: DateTime<Utc>,
    pub labels: Vec<String>,
    pub is_read: bool,
}

/// Standard CRUD plus the paginated, label-filtered listing query the
/// core needs. A session/transaction handle is exposed via `pool()` for
/// callers that need cross-statement atomicity.
#[rocket::async_trait]
pub trait RelationalStore: Send + Sync {
    async fn get_user(&self, user_id: i32) -> Result<Option<User>, sqlx::Error>;

    /// Most recent stored message date for a user; `None` if no messages exist.
    async fn watermark(&self, user_id: i32) -> Result<Option<DateTime<Utc>>, sqlx::Error>;

    async fn message_exists(
        &self,
        user_id: i32,
        provider_message_id: &str,
    ) -> Result<bool, sqlx::Error>;

    /// Insert a message, returning `None` when the `(user_id,
    /// provider_message_id)` pair already existed (idempotent ingestion).
    async fn insert_message(&self, msg: NewMessage) -> Result<Option<Message>, sqlx::Error>;

    /// Inbox messages for a user, newest first, paginated.
    async fn list_inbox_messages(
        &self,
        user_id: i32,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, sqlx::Error>;

    async fn list_all_inbox_messages(&self, user_id: i32) -> Result<Vec<Message>, sqlx::Error>;

    /// `(total, unread, read)` counts over inbox messages for a user.
    async fn read_counts(&self, user_id: i32) -> Result<(i64, i64, i64), sqlx::Error>;
}

pub struct PgRelationalStore {
    pool: PgPool,
}

impl PgRelationalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[rocket::async_trait]
impl RelationalStore for PgRelationalStore {
    async fn get_user(&self, user_id: i32) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id as user_id, external_account_id, email_address, access_credential, refresh_credential, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn watermark(&self, user_id: i32) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        sqlx::query_scalar("SELECT MAX(date) FROM messages WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn message_exists(
        &self,
        user_id: i32,
        provider_message_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(
            "SELECT 1 FROM messages WHERE user_id = $1 AND provider_message_id = $2",
        )
        .bind(user_id)
        .bind(provider_message_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn insert_message(&self, msg: NewMessage) -> Result<Option<Message>, sqlx::Error> {
        let labels = Message::labels_from_vec(&msg.labels);
        let row = sqlx::query_as::<_, Message>(
            "INSERT INTO messages (user_id, provider_message_id, sender, subject, snippet, body, date, labels, is_read)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (user_id, provider_message_id) DO NOTHING
             RETURNING id as message_id, user_id, provider_message_id, sender, subject, snippet, body, date, labels, is_read, created_at",
        )
        .bind(msg.user_id)
        .bind(&msg.provider_message_id)
        .bind(&msg.sender)
        .bind(&msg.subject)
        .bind(&msg.snippet)
        .bind(&msg.body)
        .bind(msg.date)
        .bind(&labels)
        .bind(msg.is_read)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_inbox_messages(
        &self,
        user_id: i32,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            "SELECT id as message_id, user_id, provider_message_id, sender, subject, snippet, body, date, labels, is_read, created_at
             FROM messages
             WHERE user_id = $1 AND (',' || labels || ',') LIKE '%,INBOX,%'
             ORDER BY date DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_all_inbox_messages(&self, user_id: i32) -> Result<Vec<Message>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            "SELECT id as message_id, user_id, provider_message_id, sender, subject, snippet, body, date, labels, is_read, created_at
             FROM messages
             WHERE user_id = $1 AND (',' || labels || ',') LIKE '%,INBOX,%'
             ORDER BY date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn read_counts(&self, user_id: i32) -> Result<(i64, i64, i64), sqlx::Error> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) FILTER (WHERE (',' || labels || ',') LIKE '%,INBOX,%') AS total,
                COUNT(*) FILTER (WHERE (',' || labels || ',') LIKE '%,INBOX,%' AND NOT is_read) AS unread,
                COUNT(*) FILTER (WHERE (',' || labels || ',') LIKE '%,INBOX,%' AND is_read) AS read
             FROM messages WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((row.try_get("total")?, row.try_get("unread")?, row.try_get("read")?))
    }
}
