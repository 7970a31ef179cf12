use recap_llm::{ChatClient, Message};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{Result, SessionError};
use crate::event::SessionKey;
use crate::history::HistoryStore;
use crate::prompt::{self, PreferenceSource, Transcript};
use crate::registry::SessionRegistry;
use crate::session::{SessionConfig, SessionTicket, StreamSession};
use crate::sink::DeltaSink;

/// Entry point for the UI layer: starts summary and chat streams, cancels
/// them, and owns the registry and history they share.
pub struct Summarizer {
    client: Arc<dyn ChatClient>,
    preferences: Arc<dyn PreferenceSource>,
    registry: Arc<SessionRegistry>,
    history: Arc<HistoryStore>,
    transcript: RwLock<Option<Transcript>>,
    session_config: SessionConfig,
}

impl Summarizer {
    pub fn new(client: Arc<dyn ChatClient>, preferences: Arc<dyn PreferenceSource>) -> Self {
        Self {
            client,
            preferences,
            registry: Arc::new(SessionRegistry::new()),
            history: Arc::new(HistoryStore::new()),
            transcript: RwLock::new(None),
            session_config: SessionConfig::default(),
        }
    }

    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn transcript(&self) -> Option<Transcript> {
        self.transcript
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start streaming a summary of `transcript`
    ///
    /// Starts a fresh conversation: the consumer's in-flight sessions are
    /// cancelled, the history is discarded, and the new response id is
    /// reserved as the summary. Chat turns may start while it still streams.
    pub fn start_summary<S: DeltaSink + 'static>(
        &self,
        consumer_id: &str,
        transcript: Transcript,
        sink: S,
    ) -> Result<SessionTicket> {
        let key = SessionKey::generate(consumer_id);

        self.registry.cancel_consumer(consumer_id);
        self.history.begin_summary(&key.response_id);

        let request = prompt::summary_request(&transcript, &self.preferences.preferences());
        *self.transcript.write().unwrap_or_else(PoisonError::into_inner) = Some(transcript);

        tracing::info!(session = %key, "starting summary stream");

        StreamSession::new(key, request, Arc::clone(&self.client), Arc::clone(&self.registry))
            .with_history(Arc::clone(&self.history))
            .with_config(self.session_config.clone())
            .spawn(sink)
    }

    /// Start streaming the answer to a follow-up question
    pub fn start_chat<S: DeltaSink + 'static>(
        &self,
        consumer_id: &str,
        user_message: &str,
        sink: S,
    ) -> Result<SessionTicket> {
        let transcript = self.transcript().ok_or(SessionError::NoTranscript)?;

        self.history.append(Message::user(user_message));
        let snapshot = self.history.snapshot();
        let request = prompt::chat_request(&transcript, &snapshot, &self.preferences.preferences());

        let key = SessionKey::generate(consumer_id);
        tracing::info!(session = %key, turns = snapshot.len(), "starting chat stream");

        StreamSession::new(key, request, Arc::clone(&self.client), Arc::clone(&self.registry))
            .with_history(Arc::clone(&self.history))
            .with_config(self.session_config.clone())
            .spawn(sink)
    }

    /// Cancel one session; unknown keys are ignored
    pub fn cancel(&self, key: &SessionKey) -> bool {
        self.registry.cancel(key)
    }

    /// Cancel everything one consumer has in flight (e.g. the modal closed)
    pub fn cancel_consumer(&self, consumer_id: &str) -> usize {
        self.registry.cancel_consumer(consumer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::Preferences;
    use async_trait::async_trait;
    use recap_llm::{FrameStream, LlmError, StreamRequest};
    use tokio::sync::mpsc;

    struct Unreachable;

    #[async_trait]
    impl ChatClient for Unreachable {
        async fn chat_stream(&self, _request: &StreamRequest) -> recap_llm::Result<FrameStream> {
            Err(LlmError::Stream("offline".to_string()))
        }
    }

    fn summarizer() -> Summarizer {
        Summarizer::new(Arc::new(Unreachable), Arc::new(Preferences::default()))
    }

    #[tokio::test]
    async fn test_chat_requires_transcript() {
        let summarizer = summarizer();
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = summarizer.start_chat("tab-1", "hello?", tx);

        assert!(matches!(result, Err(SessionError::NoTranscript)));
        assert!(summarizer.history().is_empty());
    }

    #[tokio::test]
    async fn test_summary_stores_transcript() {
        let summarizer = summarizer();
        let (tx, _rx) = mpsc::unbounded_channel();

        let ticket = summarizer
            .start_summary("tab-1", Transcript::new("text").with_title("Video"), tx)
            .unwrap();
        assert_eq!(ticket.key.consumer_id, "tab-1");

        assert_eq!(summarizer.transcript().unwrap().title, "Video");
        assert!(matches!(ticket.wait().await, crate::SessionOutcome::Failed(_)));
        assert!(summarizer.registry().is_empty());
    }

    #[test]
    fn test_cancel_unknown_is_noop() {
        let summarizer = summarizer();

        assert!(!summarizer.cancel(&SessionKey::new("tab-1", "missing")));
        assert_eq!(summarizer.cancel_consumer("tab-1"), 0);
    }
}
