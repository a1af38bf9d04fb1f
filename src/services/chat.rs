// src/services/chat.rs
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use super::{
    spawn_action, ServiceError, ACTION_CREATE_CHAT, ACTION_FINISH_CHAT, ACTION_NEW_MESSAGE,
};
use crate::llm_client::{ChatState, LlmGateway, MessagePair};
use crate::models::chat::{ChatSummary, Message, ROLE_ASSISTANT, ROLE_USER};
use crate::store::Store;

/// Orchestrates chat turns against the model service. One turn per chat at
/// a time: the processing flag is taken with a conditional update and a
/// second caller gets `ChatBusy` instead of queueing.
pub struct ChatService {
    store: Arc<dyn Store>,
    llm: Arc<dyn LlmGateway>,
    finish_prompt: String,
}

impl ChatService {
    pub fn new(store: Arc<dyn Store>, llm: Arc<dyn LlmGateway>, finish_prompt: String) -> Self {
        Self {
            store,
            llm,
            finish_prompt,
        }
    }

    /// Appends the user's message to the chat (creating the chat when no id
    /// is given), runs one model turn and appends the reply. On failure
    /// after the user message was written, that message stays; the next
    /// turn's history pairing tolerates the orphan.
    pub async fn new_message(
        &self,
        user_id: Uuid,
        chat_id: Option<Uuid>,
        text: &str,
    ) -> Result<(Uuid, String), ServiceError> {
        if user_id.is_nil() {
            return Err(ServiceError::InvalidArgument(
                "user id must not be empty".to_string(),
            ));
        }
        if text.trim().is_empty() {
            return Err(ServiceError::InvalidArgument(
                "message must not be empty".to_string(),
            ));
        }

        tracing::info!(user_id = %user_id, "processing new message");

        let left = self.store.messages_left(user_id).await?;
        if left <= 0 {
            tracing::info!(user_id = %user_id, "no messages left for today");
            return Err(ServiceError::QuotaExhausted);
        }

        let is_new_chat = chat_id.is_none();
        let chat_id = match chat_id {
            Some(id) => {
                let info = self
                    .store
                    .chat_short_info(id)
                    .await?
                    .ok_or(ServiceError::NotFound)?;
                if info.user_id != user_id {
                    return Err(ServiceError::NotOwner);
                }
                if info.is_finished {
                    tracing::info!(chat_id = %id, "chat already finished");
                    return Err(ServiceError::AlreadyFinished);
                }
                id
            }
            None => {
                let id = Uuid::new_v4();
                self.store.create_chat(id, user_id, Utc::now()).await?;
                tracing::info!(chat_id = %id, "created new chat");
                spawn_action(
                    &self.store,
                    ACTION_CREATE_CHAT,
                    user_id,
                    format!("user {} created chat {}", user_id, id),
                );
                id
            }
        };

        if !self.store.try_begin_processing(chat_id).await? {
            tracing::info!(chat_id = %chat_id, "chat is busy");
            return Err(ServiceError::ChatBusy);
        }
        let guard = ProcessingGuard::new(Arc::clone(&self.store), chat_id);

        let turn = self.run_turn(chat_id, is_new_chat, text).await;

        if let Err(e) = guard.release().await {
            tracing::error!(chat_id = %chat_id, "failed to clear processing flag: {}", e);
        }

        let reply = turn?;

        spawn_action(
            &self.store,
            ACTION_NEW_MESSAGE,
            user_id,
            format!("user {} sent a message in chat {}", user_id, chat_id),
        );

        Ok((chat_id, reply))
    }

    async fn run_turn(
        &self,
        chat_id: Uuid,
        is_new_chat: bool,
        text: &str,
    ) -> Result<String, ServiceError> {
        self.store
            .create_message(chat_id, ROLE_USER, text, Utc::now())
            .await?;

        let state = if is_new_chat {
            ChatState {
                history: Vec::new(),
                tree: empty_tree(),
            }
        } else {
            self.load_state(chat_id).await?
        };

        let reply = self.llm.chat(text, &state).await?;

        self.store.update_chat_tree(chat_id, &reply.tree).await?;
        self.store
            .create_message(chat_id, ROLE_ASSISTANT, &reply.response, Utc::now())
            .await?;

        Ok(reply.response)
    }

    /// Closes the chat: appends the configured finish prompt as a user
    /// message, asks the model service to summarize and stores the summary
    /// in the conclusion column. The summary is never stored as a message.
    pub async fn finish_chat(&self, user_id: Uuid, chat_id: Uuid) -> Result<String, ServiceError> {
        if user_id.is_nil() || chat_id.is_nil() {
            return Err(ServiceError::InvalidArgument(
                "user id and chat id must not be empty".to_string(),
            ));
        }

        tracing::info!(user_id = %user_id, chat_id = %chat_id, "processing finish chat");

        let info = self
            .store
            .chat_short_info(chat_id)
            .await?
            .ok_or(ServiceError::NotFound)?;
        if info.user_id != user_id {
            return Err(ServiceError::NotOwner);
        }
        if info.is_finished {
            tracing::info!(chat_id = %chat_id, "chat already finished");
            return Err(ServiceError::AlreadyFinished);
        }

        if !self.store.try_begin_processing(chat_id).await? {
            tracing::info!(chat_id = %chat_id, "chat is busy");
            return Err(ServiceError::ChatBusy);
        }
        let guard = ProcessingGuard::new(Arc::clone(&self.store), chat_id);

        match self.run_finish(chat_id).await {
            Ok(summary) => {
                // finish_chat dropped the processing flag in the same
                // statement that set the conclusion
                guard.disarm();
                spawn_action(
                    &self.store,
                    ACTION_FINISH_CHAT,
                    user_id,
                    format!("user {} finished chat {}", user_id, chat_id),
                );
                Ok(summary)
            }
            Err(e) => {
                if let Err(re) = guard.release().await {
                    tracing::error!(chat_id = %chat_id, "failed to clear processing flag: {}", re);
                }
                Err(e)
            }
        }
    }

    async fn run_finish(&self, chat_id: Uuid) -> Result<String, ServiceError> {
        self.store
            .create_message(chat_id, ROLE_USER, &self.finish_prompt, Utc::now())
            .await?;

        let state = self.load_state(chat_id).await?;
        let summary = self.llm.end_dialog(&state).await?;

        self.store.finish_chat(chat_id, &summary).await?;

        Ok(summary)
    }

    pub async fn chats(&self) -> Result<Vec<ChatSummary>, ServiceError> {
        Ok(self.store.chats(None).await?)
    }

    pub async fn chats_for_user(&self, user_id: Uuid) -> Result<Vec<ChatSummary>, ServiceError> {
        if user_id.is_nil() {
            return Err(ServiceError::InvalidArgument(
                "user id must not be empty".to_string(),
            ));
        }
        Ok(self.store.chats(Some(user_id)).await?)
    }

    pub async fn messages(&self, chat_id: Uuid) -> Result<Vec<Message>, ServiceError> {
        if chat_id.is_nil() {
            return Err(ServiceError::InvalidArgument(
                "chat id must not be empty".to_string(),
            ));
        }
        Ok(self.store.messages(chat_id).await?)
    }

    async fn load_state(&self, chat_id: Uuid) -> Result<ChatState, ServiceError> {
        let tree = self
            .store
            .chat_tree(chat_id)
            .await?
            .unwrap_or_else(empty_tree);
        let messages = self.store.messages(chat_id).await?;

        Ok(ChatState {
            history: pair_history(&messages),
            tree,
        })
    }
}

fn empty_tree() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Folds the flat message list into completed `(user, bot)` turns. A user
/// message opens a pair; an assistant message closes it. An unclosed pair
/// is flushed with an empty bot side when the next user message arrives; a
/// trailing unclosed pair is dropped, which is exactly the message the
/// current turn sends separately.
fn pair_history(messages: &[Message]) -> Vec<MessagePair> {
    let mut history = Vec::new();
    let mut current: Option<MessagePair> = None;

    for msg in messages {
        match msg.role.as_str() {
            ROLE_USER => {
                if let Some(pair) = current.take() {
                    history.push(pair);
                }
                current = Some(MessagePair {
                    user: msg.content.clone(),
                    bot: String::new(),
                });
            }
            ROLE_ASSISTANT => {
                if let Some(mut pair) = current.take() {
                    pair.bot = msg.content.clone();
                    history.push(pair);
                }
            }
            _ => {}
        }
    }

    history
}

/// Holds the chat's processing flag. Normal paths clear it explicitly via
/// `release` or hand it off with `disarm`; if the guard is dropped still
/// armed (a panic mid-turn), the flag is cleared from a spawned task.
struct ProcessingGuard {
    store: Arc<dyn Store>,
    chat_id: Uuid,
    armed: bool,
}

impl ProcessingGuard {
    fn new(store: Arc<dyn Store>, chat_id: Uuid) -> Self {
        Self {
            store,
            chat_id,
            armed: true,
        }
    }

    async fn release(mut self) -> Result<(), crate::store::StoreError> {
        self.armed = false;
        self.store.end_processing(self.chat_id).await
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        if self.armed {
            let store = Arc::clone(&self.store);
            let chat_id = self.chat_id;
            tokio::spawn(async move {
                if let Err(e) = store.end_processing(chat_id).await {
                    tracing::error!(chat_id = %chat_id, "failed to clear processing flag: {}", e);
                }
            });
        }
    }
}
