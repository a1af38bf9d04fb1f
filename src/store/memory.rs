// src/store/memory.rs
//
// In-memory Store used by service tests. Mirrors the Postgres semantics
// closely enough for the lifecycle rules to be exercised: conditional
// processing acquire, finished-chat filtering, join-style message counts.
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::models::chat::{ChatShortInfo, ChatSummary, Message};
use crate::models::user::User;

#[derive(Debug, Clone)]
pub struct MemChat {
    pub user_id: Uuid,
    pub is_finished: bool,
    pub is_processing: bool,
    pub conclusion: Option<String>,
    pub enclosure: i32,
    pub tree: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct MemState {
    users: HashMap<Uuid, User>,
    chats: HashMap<Uuid, MemChat>,
    messages: Vec<Message>,
    actions: Vec<(String, Uuid, String)>,
    cache: HashMap<String, Value>,
}

#[derive(Default)]
pub struct MemStore {
    state: Mutex<MemState>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a user with the given remaining quota and returns its id.
    pub fn seed_user(&self, login: &str, pass_hash: &str, messages_left: i32) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let user = User {
            id,
            login: login.to_string(),
            pass_hash: pass_hash.to_string(),
            is_admin: false,
            is_super_admin: false,
            messages_per_day: 100,
            messages_left_for_today: messages_left,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().unwrap().users.insert(id, user);
        id
    }

    pub fn seed_chat(&self, user_id: Uuid, is_finished: bool, is_processing: bool) -> Uuid {
        let id = Uuid::new_v4();
        let chat = MemChat {
            user_id,
            is_finished,
            is_processing,
            conclusion: None,
            enclosure: 0,
            tree: None,
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().chats.insert(id, chat);
        id
    }

    pub fn chat(&self, chat_id: Uuid) -> Option<MemChat> {
        self.state.lock().unwrap().chats.get(&chat_id).cloned()
    }

    pub fn message_count(&self, chat_id: Uuid) -> usize {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .count()
    }

    pub fn chat_count(&self) -> usize {
        self.state.lock().unwrap().chats.len()
    }

    pub fn user(&self, user_id: Uuid) -> Option<User> {
        self.state.lock().unwrap().users.get(&user_id).cloned()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.users.values().any(|u| u.login == user.login) {
            return Err(StoreError::AlreadyExists);
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn user_by_login(&self, login: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.users.values().find(|u| u.login == login).cloned())
    }

    async fn messages_left(&self, user_id: Uuid) -> Result<i32, StoreError> {
        let state = self.state.lock().unwrap();
        state
            .users
            .get(&user_id)
            .map(|u| u.messages_left_for_today)
            .ok_or(StoreError::NotFound)
    }

    async fn decrement_messages_left(&self, user_id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.users.get_mut(&user_id) {
            if user.messages_left_for_today > 0 {
                user.messages_left_for_today -= 1;
            }
        }
        Ok(())
    }

    async fn reset_daily_limits(&self) -> Result<u64, StoreError> {
        let mut state = self.state.lock().unwrap();
        let mut affected = 0;
        for user in state.users.values_mut() {
            user.messages_left_for_today = user.messages_per_day;
            affected += 1;
        }
        Ok(affected)
    }

    async fn create_chat(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let chat = MemChat {
            user_id,
            is_finished: false,
            is_processing: false,
            conclusion: None,
            enclosure: 0,
            tree: None,
            created_at,
        };
        self.state.lock().unwrap().chats.insert(chat_id, chat);
        Ok(())
    }

    async fn chat_short_info(&self, chat_id: Uuid) -> Result<Option<ChatShortInfo>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.chats.get(&chat_id).map(|c| ChatShortInfo {
            user_id: c.user_id,
            is_finished: c.is_finished,
            is_processing: c.is_processing,
        }))
    }

    async fn chats(&self, user_id: Option<Uuid>) -> Result<Vec<ChatSummary>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut summaries: Vec<ChatSummary> = state
            .chats
            .iter()
            .filter(|(_, c)| user_id.map_or(true, |owner| c.user_id == owner))
            .map(|(id, c)| ChatSummary {
                id: *id,
                user_id: c.user_id,
                is_finished: c.is_finished,
                is_processing: c.is_processing,
                conclusion: c.conclusion.clone(),
                enclosure: c.enclosure,
                messages_count: state.messages.iter().filter(|m| m.chat_id == *id).count() as i64,
                created_at: c.created_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn try_begin_processing(&self, chat_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock().unwrap();
        match state.chats.get_mut(&chat_id) {
            Some(chat) if !chat.is_processing && !chat.is_finished => {
                chat.is_processing = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn end_processing(&self, chat_id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(chat) = state.chats.get_mut(&chat_id) {
            chat.is_processing = false;
        }
        Ok(())
    }

    async fn finish_chat(&self, chat_id: Uuid, conclusion: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(chat) = state.chats.get_mut(&chat_id) {
            chat.is_finished = true;
            chat.is_processing = false;
            chat.conclusion = Some(conclusion.to_string());
        }
        Ok(())
    }

    async fn chat_tree(&self, chat_id: Uuid) -> Result<Option<Value>, StoreError> {
        let state = self.state.lock().unwrap();
        match state.chats.get(&chat_id) {
            Some(chat) => Ok(chat.tree.clone()),
            None => Err(StoreError::NotFound),
        }
    }

    async fn update_chat_tree(&self, chat_id: Uuid, tree: &Value) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(chat) = state.chats.get_mut(&chat_id) {
            chat.tree = Some(tree.clone());
        }
        Ok(())
    }

    async fn create_message(
        &self,
        chat_id: Uuid,
        role: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().messages.push(Message {
            id,
            chat_id,
            role: role.to_string(),
            content: content.to_string(),
            created_at,
        });
        Ok(id)
    }

    async fn messages(&self, chat_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut messages: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn create_action(
        &self,
        action_type: &str,
        user_id: Uuid,
        message: &str,
    ) -> Result<(), StoreError> {
        self.state.lock().unwrap().actions.push((
            action_type.to_string(),
            user_id,
            message.to_string(),
        ));
        Ok(())
    }

    async fn cached_response(&self, request_hash: &str) -> Result<Option<Value>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.cache.get(request_hash).cloned())
    }

    async fn store_response(&self, request_hash: &str, response: &Value) -> Result<(), StoreError> {
        self.state
            .lock()
            .unwrap()
            .cache
            .insert(request_hash.to_string(), response.clone());
        Ok(())
    }
}
