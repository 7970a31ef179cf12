use recap_llm::Message;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Ordered conversation log of one summary modal
///
/// The summary is the assistant message whose id was marked with
/// [`mark_summary`](Self::mark_summary), wherever it lands in the log. It stays
/// in place for display but is left out of
/// [`chat_messages`](Self::chat_messages); follow-up requests carry it in
/// their system preamble instead. Ids are unique within one history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationHistory {
    messages: Vec<Message>,
    summary_id: Option<String>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message at the end. A message carrying an id that is already
    /// present replaces that message in place instead.
    pub fn append(&mut self, message: Message) {
        let existing = message.id.as_deref().and_then(|id| self.position(id));
        match existing {
            Some(index) => self.messages[index] = message,
            None => self.messages.push(message),
        }
    }

    /// Designate the response id the summary is (or will be) stored under
    pub fn mark_summary(&mut self, id: impl Into<String>) {
        self.summary_id = Some(id.into());
    }

    /// Replace the content of the message with `id` in place, or append a new
    /// assistant message carrying that id.
    ///
    /// Returns the position of the message.
    pub fn upsert(&mut self, id: &str, content: impl Into<String>) -> usize {
        let content = content.into();
        match self.position(id) {
            Some(index) => {
                self.messages[index].content = content;
                index
            }
            None => {
                self.messages.push(Message::assistant(content).with_id(id));
                self.messages.len() - 1
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Message> {
        let index = self.position(id)?;
        Some(self.messages.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages
            .iter()
            .find(|m| m.id.as_deref() == Some(id))
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The summary, once it was committed
    pub fn summary(&self) -> Option<&Message> {
        self.get(self.summary_id.as_deref()?)
    }

    /// Messages to forward in a follow-up request: everything except the
    /// summary, in order
    pub fn chat_messages(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| !self.is_summary(m))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.summary_id = None;
    }

    fn is_summary(&self, message: &Message) -> bool {
        self.summary_id.is_some() && message.id == self.summary_id
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.messages
            .iter()
            .position(|m| m.id.as_deref() == Some(id))
    }
}

/// Shared, lock-protected [`ConversationHistory`]
///
/// Every reset bumps a generation counter. Sessions remember the generation
/// they started in and only commit into that same generation, so a stream
/// still unwinding after a new summary was requested cannot write into the
/// fresh history.
#[derive(Debug, Default)]
pub struct HistoryStore {
    inner: RwLock<Generation>,
}

#[derive(Debug, Default)]
struct Generation {
    number: u64,
    history: ConversationHistory,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, message: Message) {
        self.write().history.append(message);
    }

    pub fn upsert(&self, id: &str, content: impl Into<String>) -> usize {
        self.write().history.upsert(id, content)
    }

    /// Upsert only if the store was not reset since `generation`
    pub fn commit(&self, generation: u64, id: &str, content: impl Into<String>) -> bool {
        let mut inner = self.write();
        if inner.number != generation {
            tracing::debug!(id, generation, current = inner.number, "stale history commit dropped");
            return false;
        }
        inner.history.upsert(id, content);
        true
    }

    pub fn remove(&self, id: &str) -> Option<Message> {
        self.write().history.remove(id)
    }

    /// Copy of the current history; later changes to the store do not show
    /// up in it and changes to it do not flow back.
    pub fn snapshot(&self) -> ConversationHistory {
        self.read().history.clone()
    }

    pub fn generation(&self) -> u64 {
        self.read().number
    }

    /// Discard the history (a new summary was requested)
    pub fn reset(&self) -> u64 {
        let mut inner = self.write();
        inner.history.clear();
        inner.number += 1;
        inner.number
    }

    /// Reset, and reserve `summary_id` as the new summary, in one step
    pub fn begin_summary(&self, summary_id: &str) -> u64 {
        let mut inner = self.write();
        inner.history.clear();
        inner.history.mark_summary(summary_id);
        inner.number += 1;
        inner.number
    }

    pub fn len(&self) -> usize {
        self.read().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().history.is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, Generation> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Generation> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
