// src/store/postgres.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::models::chat::{ChatShortInfo, ChatSummary, Message};
use crate::models::user::User;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_unique(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db) = e {
        // 23505 = unique_violation
        if db.code().as_deref() == Some("23505") {
            return StoreError::AlreadyExists;
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, login, pass_hash, is_admin, is_super_admin, messages_per_day, messages_left_for_today, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(user.id)
        .bind(&user.login)
        .bind(&user.pass_hash)
        .bind(user.is_admin)
        .bind(user.is_super_admin)
        .bind(user.messages_per_day)
        .bind(user.messages_left_for_today)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_unique)?;

        Ok(())
    }

    async fn user_by_login(&self, login: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, login, pass_hash, is_admin, is_super_admin, messages_per_day, messages_left_for_today, created_at, updated_at
             FROM users
             WHERE login = $1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn messages_left(&self, user_id: Uuid) -> Result<i32, StoreError> {
        let row = sqlx::query_as::<_, (i32,)>(
            "SELECT messages_left_for_today FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(left,)| left).ok_or(StoreError::NotFound)
    }

    async fn decrement_messages_left(&self, user_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE users
             SET messages_left_for_today = messages_left_for_today - 1, updated_at = NOW()
             WHERE id = $1 AND messages_left_for_today > 0",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn reset_daily_limits(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE users
             SET messages_left_for_today = messages_per_day, updated_at = NOW()",
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn create_chat(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO chats (id, user_id, is_finished, is_processing, enclosure, created_at, updated_at)
             VALUES ($1, $2, false, false, 0, $3, $3)",
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn chat_short_info(&self, chat_id: Uuid) -> Result<Option<ChatShortInfo>, StoreError> {
        let info = sqlx::query_as::<_, ChatShortInfo>(
            "SELECT user_id, is_finished, is_processing FROM chats WHERE id = $1",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(info)
    }

    async fn chats(&self, user_id: Option<Uuid>) -> Result<Vec<ChatSummary>, StoreError> {
        let query = match user_id {
            Some(_) => {
                "SELECT c.id, c.user_id, c.is_finished, c.is_processing, c.conclusion, c.enclosure,
                        COALESCE(COUNT(m.id), 0) AS messages_count, c.created_at
                 FROM chats c
                 LEFT JOIN messages m ON c.id = m.chat_id
                 WHERE c.user_id = $1
                 GROUP BY c.id, c.user_id, c.is_finished, c.is_processing, c.conclusion, c.enclosure, c.created_at
                 ORDER BY c.created_at DESC"
            }
            None => {
                "SELECT c.id, c.user_id, c.is_finished, c.is_processing, c.conclusion, c.enclosure,
                        COALESCE(COUNT(m.id), 0) AS messages_count, c.created_at
                 FROM chats c
                 LEFT JOIN messages m ON c.id = m.chat_id
                 GROUP BY c.id, c.user_id, c.is_finished, c.is_processing, c.conclusion, c.enclosure, c.created_at
                 ORDER BY c.created_at DESC"
            }
        };

        let mut q = sqlx::query_as::<_, ChatSummary>(query);
        if let Some(owner) = user_id {
            q = q.bind(owner);
        }

        Ok(q.fetch_all(&self.pool).await?)
    }

    async fn try_begin_processing(&self, chat_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE chats
             SET is_processing = true, updated_at = NOW()
             WHERE id = $1 AND is_processing = false AND is_finished = false",
        )
        .bind(chat_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn end_processing(&self, chat_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE chats SET is_processing = false, updated_at = NOW() WHERE id = $1")
            .bind(chat_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn finish_chat(&self, chat_id: Uuid, conclusion: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE chats
             SET is_finished = true, is_processing = false, conclusion = $1, updated_at = NOW()
             WHERE id = $2",
        )
        .bind(conclusion)
        .bind(chat_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn chat_tree(&self, chat_id: Uuid) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query_as::<_, (Option<Value>,)>("SELECT tree FROM chats WHERE id = $1")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((tree,)) => Ok(tree),
            None => Err(StoreError::NotFound),
        }
    }

    async fn update_chat_tree(&self, chat_id: Uuid, tree: &Value) -> Result<(), StoreError> {
        sqlx::query("UPDATE chats SET tree = $1, updated_at = NOW() WHERE id = $2")
            .bind(tree)
            .bind(chat_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn create_message(
        &self,
        chat_id: Uuid,
        role: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        let message_id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO messages (id, chat_id, role, content, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(message_id)
        .bind(chat_id)
        .bind(role)
        .bind(content)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(message_id)
    }

    async fn messages(&self, chat_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let messages = sqlx::query_as::<_, Message>(
            "SELECT id, chat_id, role, content, created_at
             FROM messages
             WHERE chat_id = $1
             ORDER BY created_at ASC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn create_action(
        &self,
        action_type: &str,
        user_id: Uuid,
        message: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO actions (id, action_type, user_id, message, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(action_type)
        .bind(user_id)
        .bind(message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn cached_response(&self, request_hash: &str) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query_as::<_, (Value,)>(
            "SELECT response FROM llm_cache WHERE request_hash = $1",
        )
        .bind(request_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(response,)| response))
    }

    async fn store_response(&self, request_hash: &str, response: &Value) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO llm_cache (request_hash, response, created_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (request_hash) DO UPDATE SET response = $2",
        )
        .bind(request_hash)
        .bind(response)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
