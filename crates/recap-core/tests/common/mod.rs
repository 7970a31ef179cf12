#![allow(dead_code)]

use async_trait::async_trait;
use recap_core::DeltaEvent;
use recap_llm::{ChatClient, Frame, FrameStream, LlmError, StreamRequest};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

pub type FrameSender = mpsc::UnboundedSender<recap_llm::Result<Frame>>;

/// Chat client whose responses are fed by the test, one scripted stream per
/// request, in request order.
#[derive(Default)]
pub struct ScriptedClient {
    streams: Mutex<VecDeque<mpsc::UnboundedReceiver<recap_llm::Result<Frame>>>>,
    requests: Mutex<Vec<StreamRequest>>,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a stream for the next request and return its feeding end
    pub fn script(&self) -> FrameSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().unwrap().push_back(rx);
        tx
    }

    /// Queue a stream that replays `frames` and then ends
    pub fn script_frames(&self, frames: Vec<Frame>) {
        let tx = self.script();
        for frame in frames {
            tx.send(Ok(frame)).unwrap();
        }
    }

    pub fn requests(&self) -> Vec<StreamRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn chat_stream(&self, request: &StreamRequest) -> recap_llm::Result<FrameStream> {
        self.requests.lock().unwrap().push(request.clone());
        let rx = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::Stream("no scripted stream".to_string()))?;
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

/// Chat client whose request never gets a response
pub struct HangingClient;

#[async_trait]
impl ChatClient for HangingClient {
    async fn chat_stream(&self, _request: &StreamRequest) -> recap_llm::Result<FrameStream> {
        futures::future::pending().await
    }
}

/// A data frame carrying one content delta
pub fn content(text: &str) -> Frame {
    Frame::Data(json!({"choices": [{"index": 0, "delta": {"content": text}}]}).to_string())
}

/// Receive until the session drops its sink
pub async fn collect(mut rx: mpsc::UnboundedReceiver<DeltaEvent>) -> Vec<DeltaEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

/// Exactly one terminal event, and it is the last one
pub fn assert_single_terminal(events: &[DeltaEvent]) {
    let terminals = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminals, 1, "events: {:?}", events);
    assert!(events.last().map(DeltaEvent::is_terminal).unwrap_or(false));
}
