use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("telegram returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("telegram request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    token: String,
    chat_id: i64,
}

impl TelegramClient {
    pub fn new(token: String, chat_id: i64) -> Self {
        Self {
            client: Client::new(),
            token,
            chat_id,
        }
    }

    /// Sends the messages strictly in order. A failed send is logged with
    /// its index and the loop moves on; report delivery is best effort.
    /// Returns how many messages went through.
    pub async fn send_messages(&self, messages: &[String]) -> usize {
        let mut delivered = 0;

        for (index, text) in messages.iter().enumerate() {
            match self.send_one(text).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::error!(index, "failed to send report message to telegram: {}", e)
                }
            }
        }

        delivered
    }

    async fn send_one(&self, text: &str) -> Result<(), TelegramError> {
        let request = SendMessageRequest {
            chat_id: self.chat_id,
            text,
            parse_mode: "Markdown",
        };

        let response = self
            .client
            .post(format!(
                "https://api.telegram.org/bot{}/sendMessage",
                self.token
            ))
            .timeout(Duration::from_secs(30))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TelegramError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
