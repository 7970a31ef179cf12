//! Markdown → HTML for the summary and chat panes.
//!
//! Rendering always runs over the full accumulated text, never over a single
//! delta, so a half-written construct (an unclosed `**`, a table missing its
//! last row) is simply rendered as-is and fixes itself on the next update.

use pulldown_cmark::{html, Event, Options, Parser};

use crate::event::StreamUpdate;

/// Shown while a stream has not produced any text yet
pub const RECEIVING_PLACEHOLDER: &str = "<p class=\"recap-placeholder\"><em>Receiving…</em></p>\n";

/// Turns accumulated text into display markup
///
/// Implementations must be pure: the same input always gives the same output.
pub trait RenderSink: Send + Sync {
    fn render(&self, text: &str) -> String;
}

#[derive(Debug, Clone, Copy)]
pub struct MarkdownRenderer {
    options: Options,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self {
            options: Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH,
        }
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSink for MarkdownRenderer {
    fn render(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return RECEIVING_PLACEHOLDER.to_string();
        }

        // Raw HTML coming from the model is shown as text, never injected
        let parser = Parser::new_ext(text, self.options).map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        });

        let mut html_output = String::with_capacity(text.len() * 3 / 2);
        html::push_html(&mut html_output, parser);
        html_output
    }
}

/// Display-side accumulator for one session's updates
///
/// Applies [`StreamUpdate`]s the way a display surface should and hands back
/// fresh markup after each one.
pub struct DisplayBuffer<R: RenderSink = MarkdownRenderer> {
    renderer: R,
    text: String,
    finished: bool,
}

impl<R: RenderSink> DisplayBuffer<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            text: String::new(),
            finished: false,
        }
    }

    /// Apply one update and return the markup to display
    pub fn apply(&mut self, update: &StreamUpdate) -> String {
        match update {
            StreamUpdate::Delta { text, append: false } => {
                self.text = text.clone();
            }
            StreamUpdate::Delta { text, append: true } => {
                self.text.push_str(text);
            }
            StreamUpdate::Completed { text } => {
                self.text = text.clone();
                self.finished = true;
            }
            StreamUpdate::Empty { message } | StreamUpdate::Failed { message } => {
                if self.text.is_empty() {
                    self.text = message.clone();
                } else {
                    self.text.push_str("\n\n");
                    self.text.push_str(message);
                }
                self.finished = true;
            }
            // Partial text stays visible
            StreamUpdate::Cancelled => {
                self.finished = true;
            }
        }
        self.markup()
    }

    pub fn markup(&self) -> String {
        self.renderer.render(&self.text)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Default for DisplayBuffer<MarkdownRenderer> {
    fn default() -> Self {
        Self::new(MarkdownRenderer::new())
    }
}
