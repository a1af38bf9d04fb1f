// src/models/chat.rs
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

/// One row of the chat listing, message count joined in.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct ChatSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub is_finished: bool,
    pub is_processing: bool,
    pub conclusion: Option<String>,
    pub enclosure: i32,
    pub messages_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Projection used by the lifecycle checks before any write happens.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct ChatShortInfo {
    pub user_id: Uuid,
    pub is_finished: bool,
    pub is_processing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub role: String,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct NewMessageRequest {
    pub user_id: Uuid,
    pub chat_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct NewMessageResponse {
    pub chat_id: Uuid,
    pub reply: String,
}

#[derive(Debug, Deserialize)]
pub struct FinishChatRequest {
    pub user_id: Uuid,
    pub chat_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct FinishChatResponse {
    pub conclusion: String,
}

#[derive(Debug, Serialize)]
pub struct ChatListResponse {
    pub chats: Vec<ChatSummary>,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}
