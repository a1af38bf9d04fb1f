use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

/// Envelope returned by the word-to-HTML conversion service.
#[derive(Debug, Deserialize)]
pub struct ConvertedDocument {
    pub filename: String,
    pub length: i64,
    pub success: bool,
    pub text: String,
}

#[derive(Error, Debug)]
pub enum ConverterError {
    #[error("converter reported failure for {filename}")]
    ConversionFailed { filename: String },
    #[error("converter returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("converter request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct ConverterClient {
    client: Client,
    base_url: String,
}

impl ConverterClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    /// Uploads the raw document as multipart form data and returns the
    /// extracted HTML. A `success = false` envelope is an error: nothing
    /// downstream can run without the text.
    pub async fn convert(
        &self,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<ConvertedDocument, ConverterError> {
        let part = Part::bytes(data).file_name(file_name.to_string());
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/convert", self.base_url))
            .multipart(form)
            .timeout(Duration::from_secs(60))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "converter error: {}", body);
            return Err(ConverterError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let document = response.json::<ConvertedDocument>().await?;
        if !document.success {
            return Err(ConverterError::ConversionFailed {
                filename: document.filename,
            });
        }

        tracing::debug!(
            filename = %document.filename,
            length = document.length,
            "document converted"
        );

        Ok(document)
    }
}
