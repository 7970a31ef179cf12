pub mod error;
pub mod event;
pub mod history;
pub mod prompt;
pub mod registry;
pub mod render;
pub mod session;
pub mod sink;
pub mod summarizer;

pub use error::{Result, SessionError};
pub use event::{DeltaEvent, SessionKey, StreamUpdate};
pub use history::{ConversationHistory, HistoryStore};
pub use prompt::{PreferenceSource, Preferences, Transcript};
pub use registry::{SessionRegistry, StreamHandle};
pub use render::{DisplayBuffer, MarkdownRenderer, RenderSink, RECEIVING_PLACEHOLDER};
pub use session::{SessionConfig, SessionOutcome, SessionState, SessionTicket, StreamSession};
pub use sink::DeltaSink;
pub use summarizer::Summarizer;

pub use recap_llm::{ChatClient, Message, Role, StreamRequest};
