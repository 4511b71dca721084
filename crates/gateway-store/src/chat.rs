//! Thin chat-thread persistence (spec §10.4). No orchestration: a thread
//! groups messages, each message is answered by a single direct C2 call made
//! by the handler, not by this store.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use gateway_shared::model::{ChatMessage, ChatRole, ChatThread};
use gateway_shared::{GatewayError, GatewayResult};

use crate::store::{from_db_str_pub, to_db_str_pub};

#[derive(Debug, sqlx::FromRow)]
struct ThreadRow {
    id: Uuid,
    user_id: Uuid,
    title: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ThreadRow> for ChatThread {
    fn from(row: ThreadRow) -> Self {
        ChatThread { id: row.id, user_id: row.user_id, title: row.title, created_at: row.created_at }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    thread_id: Uuid,
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self) -> GatewayResult<ChatMessage> {
        Ok(ChatMessage {
            id: self.id,
            thread_id: self.thread_id,
            role: from_db_str_pub("chat_messages.role", &self.role)?,
            content: self.content,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ChatStore {
    pool: PgPool,
}

impl ChatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_thread(&self, user_id: Uuid, title: Option<&str>) -> GatewayResult<ChatThread> {
        let id = Uuid::now_v7();
        let created_at = Utc::now();
        sqlx::query("INSERT INTO chat_threads (id, user_id, title, created_at) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(user_id)
            .bind(title)
            .bind(created_at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(ChatThread { id, user_id, title: title.map(str::to_string), created_at })
    }

    pub async fn list_threads(&self, user_id: Uuid) -> GatewayResult<Vec<ChatThread>> {
        let rows: Vec<ThreadRow> = sqlx::query_as(
            "SELECT id, user_id, title, created_at FROM chat_threads WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(ChatThread::from).collect())
    }

    pub async fn get_thread(&self, id: Uuid, user_id: Uuid) -> GatewayResult<Option<ChatThread>> {
        let row: Option<ThreadRow> = sqlx::query_as(
            "SELECT id, user_id, title, created_at FROM chat_threads WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(ChatThread::from))
    }

    pub async fn add_message(&self, thread_id: Uuid, role: ChatRole, content: &str) -> GatewayResult<ChatMessage> {
        let id = Uuid::now_v7();
        let created_at = Utc::now();
        let role_str = to_db_str_pub(&role)?;
        sqlx::query("INSERT INTO chat_messages (id, thread_id, role, content, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(id)
            .bind(thread_id)
            .bind(&role_str)
            .bind(content)
            .bind(created_at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(ChatMessage { id, thread_id, role, content: content.to_string(), created_at })
    }

    pub async fn list_messages(&self, thread_id: Uuid) -> GatewayResult<Vec<ChatMessage>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, thread_id, role, content, created_at FROM chat_messages \
             WHERE thread_id = $1 ORDER BY created_at ASC",
        )
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(MessageRow::into_message).collect()
    }
}

fn db_err(e: sqlx::Error) -> GatewayError {
    GatewayError::Internal(format!("database error: {e}"))
}
