use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response from the completions endpoint
    #[error("{}", api_error_message(*status, status_text, detail.as_deref()))]
    Api {
        status: u16,
        status_text: String,
        detail: Option<String>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LlmError>;

fn api_error_message(status: u16, status_text: &str, detail: Option<&str>) -> String {
    match detail {
        Some(detail) if !detail.is_empty() => {
            format!("API request failed ({} {}): {}", status, status_text, detail)
        }
        _ => format!("API request failed ({} {})", status, status_text),
    }
}
