use recap_llm::{Message, StreamRequest};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::history::ConversationHistory;

const TRUNCATION_MARKER: &str = "\n[Transcript truncated]";

/// Transcript scraped from the video page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub channel: String,
}

impl Transcript {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            title: String::new(),
            channel: String::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }
}

/// User preferences that shape each request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub model: String,
    pub temperature: Option<f32>,
    /// Output language for summaries and answers; `None` follows the transcript
    pub language: Option<String>,
    pub max_transcript_chars: usize,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: Some(0.5),
            language: None,
            max_transcript_chars: 60_000,
        }
    }
}

impl Preferences {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn max_transcript_chars(mut self, max: usize) -> Self {
        self.max_transcript_chars = max;
        self
    }
}

/// Supplies preferences at request time
pub trait PreferenceSource: Send + Sync {
    fn preferences(&self) -> Preferences;
}

impl PreferenceSource for Preferences {
    fn preferences(&self) -> Preferences {
        self.clone()
    }
}

/// Cut the transcript to at most `max_chars` characters
pub fn truncate_transcript(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Owned(format!("{}{}", &text[..cut], TRUNCATION_MARKER)),
        None => Cow::Borrowed(text),
    }
}

fn language_instruction(preferences: &Preferences) -> String {
    match preferences.language.as_deref() {
        Some(language) if !language.trim().is_empty() => {
            format!("Write your response in {}.", language.trim())
        }
        _ => "Write your response in the language of the transcript.".to_string(),
    }
}

fn video_header(transcript: &Transcript) -> String {
    let mut header = String::new();
    if !transcript.title.is_empty() {
        header.push_str(&format!("Title: {}\n", transcript.title));
    }
    if !transcript.channel.is_empty() {
        header.push_str(&format!("Channel: {}\n", transcript.channel));
    }
    header
}

fn build_request(preferences: &Preferences, messages: Vec<Message>) -> StreamRequest {
    let request = StreamRequest::new(preferences.model.clone(), messages);
    match preferences.temperature {
        Some(temperature) => request.temperature(temperature),
        None => request,
    }
}

/// Request for the initial summary of a transcript
pub fn summary_request(transcript: &Transcript, preferences: &Preferences) -> StreamRequest {
    let system = format!(
        "You summarize video transcripts. Produce a concise, well-structured \
         Markdown summary: a one-paragraph overview, then the key points as a \
         bulleted list, then any notable conclusions. Do not invent content \
         that is not in the transcript. {}",
        language_instruction(preferences)
    );

    let user = format!(
        "{}\nTranscript:\n{}",
        video_header(transcript),
        truncate_transcript(&transcript.text, preferences.max_transcript_chars)
    );

    build_request(preferences, vec![Message::system(system), Message::user(user)])
}

/// Request for a follow-up chat turn
///
/// The summary is folded into the system preamble as background; the rest of
/// the history follows in order.
pub fn chat_request(
    transcript: &Transcript,
    history: &ConversationHistory,
    preferences: &Preferences,
) -> StreamRequest {
    let mut system = format!(
        "You answer questions about a video using its transcript. Be accurate \
         and concise, use Markdown, and say so when the transcript does not \
         cover the question. {}\n\n{}",
        language_instruction(preferences),
        video_header(transcript)
    );

    if let Some(summary) = history.summary() {
        system.push_str(&format!("\nSummary already shown to the user:\n{}\n", summary.content));
    }

    system.push_str(&format!(
        "\nTranscript:\n{}",
        truncate_transcript(&transcript.text, preferences.max_transcript_chars)
    ));

    let mut messages = vec![Message::system(system)];
    messages.extend(history.chat_messages());

    build_request(preferences, messages)
}
