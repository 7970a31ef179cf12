use thiserror::Error;

use crate::event::SessionKey;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session already in flight: {0}")]
    DuplicateSession(SessionKey),

    #[error("No transcript loaded; request a summary first")]
    NoTranscript,

    #[error(transparent)]
    Llm(#[from] recap_llm::LlmError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
