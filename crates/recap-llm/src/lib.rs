pub mod types;
pub mod traits;
pub mod streaming;
pub mod buffer_utils;
pub mod openai;
pub mod config;
pub mod error;

pub use traits::{ChatClient, StreamRequest, FrameStream};

pub use buffer_utils::{decode_stream, CircularLineBuffer, Frame, FrameDecoder};
pub use config::{CredentialSource, OpenAIConfig};
pub use error::{LlmError, Result};
pub use openai::OpenAIClient;
pub use streaming::{extract_delta, Extracted};
pub use types::{Message, Role};
