use crate::buffer_utils::Frame;
use crate::error::Result;
use crate::types::Message;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Decoded SSE frames of one streaming response, in receipt order
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame>> + Send>>;

/// Trait for streaming chat completions
///
/// Implementations resolve once the response headers are in. A non-2xx status
/// resolves to [`LlmError::Api`](crate::LlmError::Api) carrying whatever
/// structured detail the error body had.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat_stream(&self, request: &StreamRequest) -> Result<FrameStream>;
}

/// Body of a chat completion request
///
/// Built once and never mutated after submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub stream: bool,
}

impl StreamRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            stream: true,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}
