// src/handlers/chat.rs
use crate::handlers::{service_error, HandlerError};
use crate::models::chat::{
    ChatListResponse, FinishChatRequest, FinishChatResponse, MessagesResponse, NewMessageRequest,
    NewMessageResponse,
};
use crate::AppState;
use axum::{
    extract::{Extension, Path, Query},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Deserialize)]
struct ChatListQuery {
    user_id: Option<Uuid>,
}

pub fn chat_routes() -> Router {
    Router::new()
        .route("/api/chats/message", post(new_message))
        .route("/api/chats/finish", post(finish_chat))
        .route("/api/chats", get(list_chats))
        .route("/api/chats/:chat_id/messages", get(list_messages))
}

async fn new_message(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<NewMessageRequest>,
) -> Result<Json<NewMessageResponse>, HandlerError> {
    let (chat_id, reply) = state
        .chat_service
        .new_message(payload.user_id, payload.chat_id, &payload.message)
        .await
        .map_err(service_error)?;

    Ok(Json(NewMessageResponse { chat_id, reply }))
}

async fn finish_chat(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<FinishChatRequest>,
) -> Result<Json<FinishChatResponse>, HandlerError> {
    let conclusion = state
        .chat_service
        .finish_chat(payload.user_id, payload.chat_id)
        .await
        .map_err(service_error)?;

    Ok(Json(FinishChatResponse { conclusion }))
}

async fn list_chats(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<ChatListQuery>,
) -> Result<Json<ChatListResponse>, HandlerError> {
    let chats = match query.user_id {
        Some(user_id) => state.chat_service.chats_for_user(user_id).await,
        None => state.chat_service.chats().await,
    }
    .map_err(service_error)?;

    Ok(Json(ChatListResponse { chats }))
}

async fn list_messages(
    Extension(state): Extension<Arc<AppState>>,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<MessagesResponse>, HandlerError> {
    let messages = state
        .chat_service
        .messages(chat_id)
        .await
        .map_err(service_error)?;

    Ok(Json(MessagesResponse { messages }))
}
