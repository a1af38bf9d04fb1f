// src/store/mod.rs
#[cfg(test)]
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::chat::{ChatShortInfo, ChatSummary, Message};
use crate::models::user::User;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,
    #[error("unique constraint violated")]
    AlreadyExists,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Storage port for users, chats, messages, the action log and the
/// analyzer response cache. `PgStore` is the production implementation;
/// service tests run against an in-memory one.
#[async_trait]
pub trait Store: Send + Sync {
    // users
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;
    async fn user_by_login(&self, login: &str) -> Result<Option<User>, StoreError>;
    async fn messages_left(&self, user_id: Uuid) -> Result<i32, StoreError>;
    async fn decrement_messages_left(&self, user_id: Uuid) -> Result<(), StoreError>;
    async fn reset_daily_limits(&self) -> Result<u64, StoreError>;

    // chats
    async fn create_chat(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    async fn chat_short_info(&self, chat_id: Uuid) -> Result<Option<ChatShortInfo>, StoreError>;
    async fn chats(&self, user_id: Option<Uuid>) -> Result<Vec<ChatSummary>, StoreError>;
    /// Conditional acquire of the processing flag. Returns false when the
    /// chat is already processing or already finished.
    async fn try_begin_processing(&self, chat_id: Uuid) -> Result<bool, StoreError>;
    async fn end_processing(&self, chat_id: Uuid) -> Result<(), StoreError>;
    /// Sets conclusion, marks the chat finished and drops the processing
    /// flag in a single statement.
    async fn finish_chat(&self, chat_id: Uuid, conclusion: &str) -> Result<(), StoreError>;
    async fn chat_tree(&self, chat_id: Uuid) -> Result<Option<Value>, StoreError>;
    async fn update_chat_tree(&self, chat_id: Uuid, tree: &Value) -> Result<(), StoreError>;

    // messages
    async fn create_message(
        &self,
        chat_id: Uuid,
        role: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Uuid, StoreError>;
    async fn messages(&self, chat_id: Uuid) -> Result<Vec<Message>, StoreError>;

    // action log
    async fn create_action(
        &self,
        action_type: &str,
        user_id: Uuid,
        message: &str,
    ) -> Result<(), StoreError>;

    // analyzer response cache
    async fn cached_response(&self, request_hash: &str) -> Result<Option<Value>, StoreError>;
    async fn store_response(&self, request_hash: &str, response: &Value) -> Result<(), StoreError>;
}
