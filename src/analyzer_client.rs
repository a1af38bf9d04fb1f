use std::sync::Arc;
use std::time::Duration;

use backoff::{future::retry, ExponentialBackoff};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::llm_client::ValidationItem;
use crate::store::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: i64,
    pub completion: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default)]
    pub paragraph: String,
    #[serde(default)]
    pub quote: String,
    #[serde(default)]
    pub advice: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportError {
    pub code: String,
    pub title: String,
    pub kind: String,
    #[serde(default)]
    pub findings: Vec<Finding>,
}

/// Successful analyzer verdict over one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeReport {
    pub tokens: TokenUsage,
    #[serde(default)]
    pub errors: Vec<ReportError>,
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ValidationEnvelope {
    detail: Vec<ValidationItem>,
}

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("analyzer rejected the request: {0:?}")]
    Validation(Vec<ValidationItem>),
    #[error("analyzer returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("analyzer request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("failed to decode analyzer response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Client for the requirements analyzer. Responses are cached by request
/// hash when a store is attached; analysis of a large document is slow and
/// retries of identical uploads are common.
#[derive(Clone)]
pub struct AnalyzerClient {
    client: Client,
    base_url: String,
    cache: Option<Arc<dyn Store>>,
}

impl AnalyzerClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            cache: None,
        }
    }

    pub fn with_cache(mut self, store: Arc<dyn Store>) -> Self {
        self.cache = Some(store);
        self
    }

    pub async fn analyze(&self, text: &str) -> Result<AnalyzeReport, AnalyzerError> {
        let request = AnalyzeRequest { text };
        let payload = serde_json::to_value(&request)?;
        let request_hash = hash_payload(&payload);

        if let Some(store) = &self.cache {
            match store.cached_response(&request_hash).await {
                Ok(Some(cached)) => match serde_json::from_value::<AnalyzeReport>(cached) {
                    Ok(report) => {
                        tracing::info!(hash = %request_hash, "analyzer cache hit");
                        return Ok(report);
                    }
                    Err(e) => tracing::warn!("discarding unreadable cache entry: {}", e),
                },
                Ok(None) => {}
                Err(e) => tracing::warn!("analyzer cache lookup failed: {}", e),
            }
        }

        let backoff_config = ExponentialBackoff {
            initial_interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(60),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(180)),
            ..Default::default()
        };

        let operation = || async {
            let response = self
                .client
                .post(format!("{}/analyze", self.base_url))
                .timeout(Duration::from_secs(1800))
                .json(&request)
                .send()
                .await
                .map_err(|e| {
                    if e.is_connect() || e.is_timeout() {
                        tracing::warn!("analyzer connection error (retrying): {}", e);
                        backoff::Error::transient(AnalyzerError::Request(e))
                    } else {
                        backoff::Error::permanent(AnalyzerError::Request(e))
                    }
                })?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| backoff::Error::permanent(AnalyzerError::Request(e)))?;

            if status == StatusCode::UNPROCESSABLE_ENTITY {
                let err = match serde_json::from_str::<ValidationEnvelope>(&body) {
                    Ok(envelope) => AnalyzerError::Validation(envelope.detail),
                    Err(_) => AnalyzerError::Upstream {
                        status: status.as_u16(),
                        body,
                    },
                };
                tracing::error!("analyzer rejected the request: {}", err);
                return Err(backoff::Error::permanent(err));
            }

            if matches!(status.as_u16(), 429 | 500 | 502 | 503) {
                tracing::warn!(status = %status, "analyzer returned {} (retrying)", status);
                return Err(backoff::Error::transient(AnalyzerError::Upstream {
                    status: status.as_u16(),
                    body,
                }));
            }

            if !status.is_success() {
                return Err(backoff::Error::permanent(AnalyzerError::Upstream {
                    status: status.as_u16(),
                    body,
                }));
            }

            serde_json::from_str::<AnalyzeReport>(&body)
                .map_err(|e| backoff::Error::permanent(AnalyzerError::Decode(e)))
        };

        let report = retry(backoff_config, operation).await?;

        if let Some(store) = &self.cache {
            match serde_json::to_value(&report) {
                Ok(value) => {
                    if let Err(e) = store.store_response(&request_hash, &value).await {
                        tracing::warn!("failed to cache analyzer response: {}", e);
                    }
                }
                Err(e) => tracing::warn!("failed to serialize analyzer response for cache: {}", e),
            }
        }

        Ok(report)
    }
}

fn hash_payload(payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_decoding_defaults_missing_findings() {
        let body = r#"{
            "tokens": {"prompt": 10, "completion": 5, "total": 15},
            "errors": [{"code": "E01", "title": "Vague wording", "kind": "logic"}]
        }"#;

        let report: AnalyzeReport = serde_json::from_str(body).unwrap();
        assert_eq!(report.tokens.total, 15);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].findings.is_empty());
    }

    #[test]
    fn test_hash_is_stable_for_equal_payloads() {
        let a = hash_payload(&json!({"text": "abc"}));
        let b = hash_payload(&json!({"text": "abc"}));
        let c = hash_payload(&json!({"text": "abd"}));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
