// src/services/mod.rs
pub mod chat;
pub mod user;

pub use chat::ChatService;
pub use user::UserService;

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::llm_client::LlmError;
use crate::store::{Store, StoreError};

pub const ACTION_REGISTER: &str = "register";
pub const ACTION_LOGIN: &str = "login";
pub const ACTION_CREATE_CHAT: &str = "create_chat";
pub const ACTION_NEW_MESSAGE: &str = "new_message";
pub const ACTION_FINISH_CHAT: &str = "finish_chat";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("no messages left for today")]
    QuotaExhausted,
    #[error("chat is processing another request")]
    ChatBusy,
    #[error("chat already finished")]
    AlreadyFinished,
    #[error("chat belongs to another user")]
    NotOwner,
    #[error("upstream failure: {0}")]
    Upstream(String),
    #[error("upstream validation failure: {0}")]
    Validation(String),
    #[error("internal error")]
    Internal,
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ServiceError::NotFound,
            StoreError::AlreadyExists => ServiceError::AlreadyExists,
            StoreError::Database(err) => {
                tracing::error!("database error: {}", err);
                ServiceError::Internal
            }
        }
    }
}

impl From<LlmError> for ServiceError {
    fn from(e: LlmError) -> Self {
        tracing::error!("model service call failed: {}", e);
        match e {
            LlmError::Validation(items) => {
                let msg = items
                    .iter()
                    .map(|item| item.msg.clone())
                    .collect::<Vec<_>>()
                    .join("; ");
                ServiceError::Validation(msg)
            }
            other => ServiceError::Upstream(other.to_string()),
        }
    }
}

/// Fires an audit record without waiting for it. The log is best effort:
/// a failed insert must never fail the operation that produced it.
pub(crate) fn spawn_action(
    store: &Arc<dyn Store>,
    action_type: &'static str,
    user_id: Uuid,
    message: String,
) {
    let store = Arc::clone(store);
    tokio::spawn(async move {
        if let Err(e) = store.create_action(action_type, user_id, &message).await {
            tracing::error!("failed to record {} action: {}", action_type, e);
        }
    });
}
