use futures::StreamExt;
use recap_llm::{extract_delta, ChatClient, Extracted, Frame, FrameStream, StreamRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::event::{DeltaEvent, SessionKey, StreamUpdate};
use crate::history::HistoryStore;
use crate::registry::{RegistryGuard, SessionRegistry, StreamHandle};
use crate::sink::DeltaSink;

pub const EMPTY_RESPONSE_MESSAGE: &str =
    "The model returned an empty response. Please try again.";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Longest wait for the next frame before the stream is given up;
    /// 0 waits forever
    pub idle_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 90,
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        match self.idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// How a session ended, as seen by whoever awaits it
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Completed(String),
    Empty,
    Cancelled,
    Failed(String),
}

/// A spawned session: its key (for cancellation), its task, and a view of
/// its state as it moves through the machine
#[derive(Debug)]
pub struct SessionTicket {
    pub key: SessionKey,
    pub task: JoinHandle<SessionOutcome>,
    pub state: watch::Receiver<SessionState>,
}

impl SessionTicket {
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Wait for the session to end
    pub async fn wait(self) -> SessionOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => SessionOutcome::Cancelled,
            Err(e) => SessionOutcome::Failed(format!("Session task failed: {}", e)),
        }
    }
}

enum Step {
    Cancelled,
    Frame(Option<recap_llm::Result<Frame>>),
    TimedOut,
}

/// One outbound streaming request, driven end to end
pub struct StreamSession {
    key: SessionKey,
    request: StreamRequest,
    client: Arc<dyn ChatClient>,
    registry: Arc<SessionRegistry>,
    history: Option<(Arc<HistoryStore>, u64)>,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
}

impl StreamSession {
    pub fn new(
        key: SessionKey,
        request: StreamRequest,
        client: Arc<dyn ChatClient>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            key,
            request,
            client,
            registry,
            history: None,
            config: SessionConfig::default(),
            state: watch::Sender::new(SessionState::Idle),
        }
    }

    /// Commit the finished response into `history` under the response id.
    /// The commit is skipped if the history is reset before the stream ends.
    pub fn with_history(mut self, history: Arc<HistoryStore>) -> Self {
        let generation = history.generation();
        self.history = Some((history, generation));
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Follow state transitions from another task
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Register, then run to completion on the current task
    pub async fn run<S: DeltaSink + ?Sized>(self, sink: &S) -> Result<SessionOutcome> {
        let handle = StreamHandle::new();
        let guard = RegistryGuard::register(&self.registry, self.key.clone(), handle.clone())?;
        Ok(self.drive(handle, guard, sink).await)
    }

    /// Register, then run on a new task
    ///
    /// The key is registered before this returns, so it can be cancelled
    /// right away.
    pub fn spawn<S: DeltaSink + 'static>(self, sink: S) -> Result<SessionTicket> {
        let handle = StreamHandle::new();
        let guard = RegistryGuard::register(&self.registry, self.key.clone(), handle.clone())?;
        let key = self.key.clone();
        let state = self.subscribe();

        let task = tokio::spawn(async move { self.drive(handle, guard, &sink).await });

        Ok(SessionTicket { key, task, state })
    }

    async fn drive<S: DeltaSink + ?Sized>(
        self,
        handle: StreamHandle,
        guard: RegistryGuard,
        sink: &S,
    ) -> SessionOutcome {
        let token = handle.token().clone();

        tracing::info!(
            session = %self.key,
            model = %self.request.model,
            "stream session started"
        );

        self.state.send_replace(SessionState::Requesting);
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = self.client.chat_stream(&self.request) => Some(result),
        };

        let frames = match opened {
            None => return self.cancelled(guard, sink).await,
            Some(Err(e)) => {
                tracing::warn!(session = %self.key, error = %e, "stream request failed");
                return self.failed(guard, sink, e.to_string()).await;
            }
            Some(Ok(frames)) => frames,
        };

        self.state.send_replace(SessionState::Streaming);
        self.read_frames(frames, &handle, guard, sink).await
    }

    async fn read_frames<S: DeltaSink + ?Sized>(
        self,
        mut frames: FrameStream,
        handle: &StreamHandle,
        guard: RegistryGuard,
        sink: &S,
    ) -> SessionOutcome {
        let token = handle.token();
        let idle_timeout = self.config.idle_timeout();
        let mut accumulated = String::new();
        let mut first = true;

        loop {
            let step = tokio::select! {
                biased;
                _ = token.cancelled() => Step::Cancelled,
                next = next_frame(&mut frames, idle_timeout) => match next {
                    Some(frame) => Step::Frame(frame),
                    None => Step::TimedOut,
                },
            };

            let data = match step {
                Step::Cancelled => return self.cancelled(guard, sink).await,
                Step::TimedOut => {
                    tracing::warn!(session = %self.key, "stream idle timeout");
                    let message = format!(
                        "Streaming error: no data received for {} seconds",
                        self.config.idle_timeout_secs
                    );
                    return self.failed(guard, sink, message).await;
                }
                Step::Frame(None) | Step::Frame(Some(Ok(Frame::Done))) => break,
                Step::Frame(Some(Err(e))) => {
                    tracing::warn!(session = %self.key, error = %e, "stream read failed");
                    return self.failed(guard, sink, format!("Streaming error: {}", e)).await;
                }
                Step::Frame(Some(Ok(Frame::Data(data)))) => data,
            };

            let content = match extract_delta(&data) {
                Extracted::Drop => continue,
                Extracted::Text { content, finish_reason } => {
                    if let Some(reason) = finish_reason {
                        tracing::debug!(session = %self.key, reason = %reason, "finish reason received");
                    }
                    content
                }
            };

            accumulated.push_str(&content);
            let update = StreamUpdate::Delta {
                text: content,
                append: !first,
            };
            first = false;

            if !self.deliver(sink, update).await {
                tracing::debug!(session = %self.key, "sink closed, abandoning stream");
                return self.cancelled(guard, sink).await;
            }
        }

        if accumulated.is_empty() {
            return self.empty(guard, sink).await;
        }
        self.completed(guard, sink, accumulated).await
    }

    async fn completed<S: DeltaSink + ?Sized>(
        self,
        guard: RegistryGuard,
        sink: &S,
        text: String,
    ) -> SessionOutcome {
        if let Some((history, generation)) = &self.history {
            history.commit(*generation, &self.key.response_id, text.clone());
        }

        tracing::info!(session = %self.key, chars = text.len(), "stream session completed");
        self.finish(
            guard,
            sink,
            SessionState::Completed,
            StreamUpdate::Completed { text: text.clone() },
        )
        .await;
        SessionOutcome::Completed(text)
    }

    async fn empty<S: DeltaSink + ?Sized>(self, guard: RegistryGuard, sink: &S) -> SessionOutcome {
        tracing::warn!(session = %self.key, "stream completed without content");
        self.finish(
            guard,
            sink,
            SessionState::Failed,
            StreamUpdate::Empty {
                message: EMPTY_RESPONSE_MESSAGE.to_string(),
            },
        )
        .await;
        SessionOutcome::Empty
    }

    async fn cancelled<S: DeltaSink + ?Sized>(self, guard: RegistryGuard, sink: &S) -> SessionOutcome {
        // History only changes in `completed`, so there is nothing to undo
        tracing::info!(session = %self.key, "stream session cancelled");
        self.finish(guard, sink, SessionState::Cancelled, StreamUpdate::Cancelled)
            .await;
        SessionOutcome::Cancelled
    }

    async fn failed<S: DeltaSink + ?Sized>(
        self,
        guard: RegistryGuard,
        sink: &S,
        message: String,
    ) -> SessionOutcome {
        self.finish(
            guard,
            sink,
            SessionState::Failed,
            StreamUpdate::Failed {
                message: message.clone(),
            },
        )
        .await;
        SessionOutcome::Failed(message)
    }

    /// Deliver the terminal update, then leave the registry
    async fn finish<S: DeltaSink + ?Sized>(
        &self,
        guard: RegistryGuard,
        sink: &S,
        state: SessionState,
        update: StreamUpdate,
    ) {
        self.state.send_replace(state);
        self.deliver(sink, update).await;
        drop(guard);
    }

    async fn deliver<S: DeltaSink + ?Sized>(&self, sink: &S, update: StreamUpdate) -> bool {
        sink.deliver(DeltaEvent::new(self.key.clone(), update)).await
    }
}

/// Next frame, or `None` if `idle_timeout` passed first
async fn next_frame(
    frames: &mut FrameStream,
    idle_timeout: Option<Duration>,
) -> Option<Option<recap_llm::Result<Frame>>> {
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, frames.next()).await.ok(),
        None => Some(frames.next().await),
    }
}
