use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SessionError};
use crate::event::SessionKey;

/// Cancellation capability of one in-flight session
#[derive(Debug, Clone, Default)]
pub struct StreamHandle {
    token: CancellationToken,
}

impl StreamHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the session to stop at its next suspension point
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Maps in-flight sessions to their cancellation handles
///
/// Owned by the host for its whole lifetime and shared with every session
/// through an `Arc`.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionKey, StreamHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, key: SessionKey, handle: StreamHandle) -> Result<()> {
        let mut sessions = self.sessions();
        if sessions.contains_key(&key) {
            return Err(SessionError::DuplicateSession(key));
        }
        sessions.insert(key, handle);
        Ok(())
    }

    /// Cancel one session. Unknown or finished keys are ignored.
    ///
    /// Returns whether a live session was signalled.
    pub fn cancel(&self, key: &SessionKey) -> bool {
        match self.sessions().get(key) {
            Some(handle) => {
                tracing::info!(session = %key, "cancelling stream session");
                handle.cancel();
                true
            }
            None => {
                tracing::debug!(session = %key, "cancel for unknown session ignored");
                false
            }
        }
    }

    /// Cancel every session started by one consumer
    pub fn cancel_consumer(&self, consumer_id: &str) -> usize {
        let sessions = self.sessions();
        let mut cancelled = 0;
        for (key, handle) in sessions.iter() {
            if key.consumer_id == consumer_id {
                handle.cancel();
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            tracing::info!(consumer = consumer_id, cancelled, "cancelled consumer sessions");
        }
        cancelled
    }

    pub fn remove(&self, key: &SessionKey) -> Option<StreamHandle> {
        self.sessions().remove(key)
    }

    pub fn is_active(&self, key: &SessionKey) -> bool {
        self.sessions().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionKey, StreamHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes its key from the registry when dropped, whichever way the owning
/// session ends (including its task being aborted).
pub(crate) struct RegistryGuard {
    registry: Arc<SessionRegistry>,
    key: SessionKey,
}

impl RegistryGuard {
    pub(crate) fn register(
        registry: &Arc<SessionRegistry>,
        key: SessionKey,
        handle: StreamHandle,
    ) -> Result<Self> {
        registry.register(key.clone(), handle)?;
        Ok(Self {
            registry: Arc::clone(registry),
            key,
        })
    }
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.key);
        tracing::debug!(session = %self.key, "session removed from registry");
    }
}
