use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One completed exchange: what the user said and what the model replied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePair {
    pub user: String,
    pub bot: String,
}

/// Conversation state shuttled to the model service on every call. The
/// tree is an opaque document owned by that service; it is stored and
/// passed back verbatim, never inspected here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatState {
    pub history: Vec<MessagePair>,
    pub tree: Value,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    user_message: &'a str,
    history: &'a [MessagePair],
    tree: &'a Value,
}

#[derive(Debug, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub tree: Value,
}

#[derive(Debug, Serialize)]
struct EndDialogRequest<'a> {
    history: &'a [MessagePair],
    tree: &'a Value,
}

#[derive(Debug, Deserialize)]
struct EndDialogResponse {
    summary: String,
}

/// One entry of the FastAPI-style 422 envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationItem {
    pub loc: Vec<Value>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
struct ValidationEnvelope {
    detail: Vec<ValidationItem>,
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("model service rejected the request: {0:?}")]
    Validation(Vec<ValidationItem>),
    #[error("model service returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("model service request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Seam between the chat service and the model service; tests swap in an
/// instant stub.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn chat(&self, user_message: &str, state: &ChatState) -> Result<ChatReply, LlmError>;
    async fn end_dialog(&self, state: &ChatState) -> Result<String, LlmError>;
}

#[derive(Debug, Clone)]
pub struct LlmClient {
    client: Client,
    base_url: String,
    mocked: bool,
}

const MOCKED_REPLY: &str = "mocked reply (model service is offline)";
const MOCKED_SUMMARY: &str = "mocked summary (model service is offline)";

impl LlmClient {
    pub fn new(base_url: String, mocked: bool) -> Self {
        Self {
            client: Client::new(),
            base_url,
            mocked,
        }
    }
}

fn error_from(status: StatusCode, body: String) -> LlmError {
    if status == StatusCode::UNPROCESSABLE_ENTITY {
        if let Ok(envelope) = serde_json::from_str::<ValidationEnvelope>(&body) {
            return LlmError::Validation(envelope.detail);
        }
    }
    LlmError::Upstream {
        status: status.as_u16(),
        body: snippet(&body),
    }
}

fn snippet(body: &str) -> String {
    const MAX: usize = 512;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[async_trait]
impl LlmGateway for LlmClient {
    async fn chat(&self, user_message: &str, state: &ChatState) -> Result<ChatReply, LlmError> {
        if self.mocked {
            tokio::time::sleep(Duration::from_secs(5)).await;
            return Ok(ChatReply {
                response: MOCKED_REPLY.to_string(),
                tree: state.tree.clone(),
            });
        }

        let request = ChatRequest {
            user_message,
            history: &state.history,
            tree: &state.tree,
        };

        tracing::debug!(
            history_len = state.history.len(),
            "sending chat turn to model service"
        );

        let response = self
            .client
            .post(format!("{}/chat", self.base_url))
            .timeout(Duration::from_secs(60))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "model service error on /chat: {}", body);
            return Err(error_from(status, body));
        }

        Ok(response.json::<ChatReply>().await?)
    }

    async fn end_dialog(&self, state: &ChatState) -> Result<String, LlmError> {
        if self.mocked {
            tokio::time::sleep(Duration::from_secs(5)).await;
            return Ok(MOCKED_SUMMARY.to_string());
        }

        let request = EndDialogRequest {
            history: &state.history,
            tree: &state.tree,
        };

        tracing::debug!(
            history_len = state.history.len(),
            "requesting dialog summary from model service"
        );

        let response = self
            .client
            .post(format!("{}/end_dialog", self.base_url))
            .timeout(Duration::from_secs(60))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "model service error on /end_dialog: {}", body);
            return Err(error_from(status, body));
        }

        let reply = response.json::<EndDialogResponse>().await?;
        Ok(reply.summary)
    }
}
