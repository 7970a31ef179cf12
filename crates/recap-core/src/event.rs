use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one in-flight response: which consumer asked, and which
/// response it is. Response ids are generated fresh per request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub consumer_id: String,
    pub response_id: String,
}

impl SessionKey {
    pub fn new(consumer_id: impl Into<String>, response_id: impl Into<String>) -> Self {
        Self {
            consumer_id: consumer_id.into(),
            response_id: response_id.into(),
        }
    }

    /// Key with a newly generated response id
    pub fn generate(consumer_id: impl Into<String>) -> Self {
        Self::new(consumer_id, Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.consumer_id, self.response_id)
    }
}

/// Everything a stream session ever tells its consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamUpdate {
    /// Incremental text. `append == false` only on the first delta of a
    /// stream, which replaces whatever the display held before.
    Delta { text: String, append: bool },

    /// Stream finished; `text` is the full response and replaces the display
    Completed { text: String },

    /// Stream finished without producing any text
    Empty { message: String },

    /// Request or stream failed; `message` is meant to be shown to the user
    Failed { message: String },

    /// Stopped on request; not an error
    Cancelled,
}

impl StreamUpdate {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Delta { .. })
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Delta { text, .. } | Self::Completed { text } => Some(text),
            Self::Empty { message } | Self::Failed { message } => Some(message),
            Self::Cancelled => None,
        }
    }
}

/// An update addressed to one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaEvent {
    pub key: SessionKey,
    #[serde(flatten)]
    pub update: StreamUpdate,
}

impl DeltaEvent {
    pub fn new(key: SessionKey, update: StreamUpdate) -> Self {
        Self { key, update }
    }

    pub fn is_terminal(&self) -> bool {
        self.update.is_terminal()
    }
}
