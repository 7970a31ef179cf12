// OpenAI-compatible chat streaming client

use crate::buffer_utils::decode_stream;
use crate::config::{CredentialSource, OpenAIConfig};
use crate::error::{LlmError, Result};
use crate::traits::{ChatClient, FrameStream, StreamRequest};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Response;
use serde_json::Value;
use std::sync::Arc;

const MAX_RAW_DETAIL_CHARS: usize = 300;

/// OpenAI client (HTTP direct, no SDK)
pub struct OpenAIClient {
    http_client: reqwest::Client,
    credentials: Arc<dyn CredentialSource>,
}

impl OpenAIClient {
    /// Create new client with a fixed configuration
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        config.validate()?;
        Self::with_credentials(Arc::new(config))
    }

    /// Create a client that looks credentials up on every request
    pub fn with_credentials(credentials: Arc<dyn CredentialSource>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http_client,
            credentials,
        })
    }
}

#[async_trait]
impl ChatClient for OpenAIClient {
    async fn chat_stream(&self, request: &StreamRequest) -> Result<FrameStream> {
        let credentials = self.credentials.credentials()?;
        credentials.validate()?;

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "sending chat completion request"
        );

        let response = self
            .http_client
            .post(format!("{}/chat/completions", credentials.base_url()))
            .bearer_auth(&credentials.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(LlmError::from));

        Ok(decode_stream(bytes))
    }
}

async fn api_error(response: Response) -> LlmError {
    let status = response.status();
    let status_text = status.canonical_reason().unwrap_or_default().to_string();
    let body = response.text().await.unwrap_or_default();

    tracing::warn!(status = status.as_u16(), "chat completion request rejected");

    LlmError::Api {
        status: status.as_u16(),
        status_text,
        detail: error_detail(&body),
    }
}

/// Best-effort detail from an error body
///
/// Understands `{"error":{"message":..}}`, `{"error":".."}` and
/// `{"message":..}`; anything else falls back to the (shortened) raw body.
fn error_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let detail = value
            .pointer("/error/message")
            .or_else(|| value.get("error").filter(|e| e.is_string()))
            .or_else(|| value.get("message"))
            .and_then(Value::as_str);
        if let Some(detail) = detail {
            return Some(detail.to_string());
        }
    }

    Some(body.chars().take(MAX_RAW_DETAIL_CHARS).collect())
}
