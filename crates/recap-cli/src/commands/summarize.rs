use anyhow::{Context, Result};
use clap::Args;
use recap_core::{
    DeltaEvent, DisplayBuffer, SessionOutcome, SessionTicket, StreamUpdate, Summarizer, Transcript,
};
use recap_llm::OpenAIClient;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::config::Config;

const CONSUMER_ID: &str = "cli";

#[derive(Args, Debug)]
pub struct SummarizeArgs {
    /// Plain-text transcript to summarize
    pub transcript: PathBuf,

    /// Video title
    #[arg(long, default_value = "")]
    pub title: String,

    /// Channel that published the video
    #[arg(long, default_value = "")]
    pub channel: String,

    /// Also write the rendered HTML of every turn to this file
    #[arg(long)]
    pub html_out: Option<PathBuf>,

    /// Keep reading follow-up questions from stdin after the summary
    #[arg(long)]
    pub chat: bool,
}

pub async fn run(config: &Config, args: SummarizeArgs) -> Result<()> {
    let text = tokio::fs::read_to_string(&args.transcript)
        .await
        .with_context(|| format!("Failed to read transcript {}", args.transcript.display()))?;

    let transcript = Transcript::new(text)
        .with_title(args.title)
        .with_channel(args.channel);

    let client = OpenAIClient::with_credentials(Arc::new(config.credentials()))
        .context("Failed to build LLM client")?;
    let summarizer = Summarizer::new(Arc::new(client), Arc::new(config.preferences()))
        .with_session_config(config.session_config());

    let capacity = config.stream.channel_capacity.max(1);
    let mut pages = Vec::new();

    let (tx, rx) = mpsc::channel(capacity);
    let ticket = summarizer.start_summary(CONSUMER_ID, transcript, tx)?;
    pages.push(stream_turn(&summarizer, ticket, rx).await?);

    if args.chat {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            prompt()?;
            let line = tokio::select! {
                line = lines.next_line() => line.context("Failed to read stdin")?,
                _ = tokio::signal::ctrl_c() => None,
            };

            let Some(line) = line else { break };
            let question = line.trim();
            if question.is_empty() {
                continue;
            }
            if question == "/quit" {
                break;
            }

            let (tx, rx) = mpsc::channel(capacity);
            let ticket = summarizer.start_chat(CONSUMER_ID, question, tx)?;
            pages.push(stream_turn(&summarizer, ticket, rx).await?);
        }
    }

    if let Some(path) = &args.html_out {
        tokio::fs::write(path, pages.join("<hr>\n"))
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "rendered HTML written");
    }

    Ok(())
}

/// Print one session's updates as they arrive; Ctrl-C cancels it
///
/// Returns the rendered markup of the turn.
async fn stream_turn(
    summarizer: &Summarizer,
    ticket: SessionTicket,
    mut rx: mpsc::Receiver<DeltaEvent>,
) -> Result<String> {
    let mut display: DisplayBuffer = DisplayBuffer::default();
    let mut stdout = std::io::stdout();

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                display.apply(&event.update);
                print_update(&mut stdout, &event.update)?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(session = %ticket.key, "interrupt received");
                summarizer.cancel(&ticket.key);
            }
        }
    }

    match ticket.wait().await {
        SessionOutcome::Completed(text) => tracing::debug!(chars = text.len(), "turn completed"),
        outcome => tracing::debug!(?outcome, "turn ended"),
    }

    Ok(display.markup())
}

fn print_update(out: &mut impl Write, update: &StreamUpdate) -> Result<()> {
    match update {
        StreamUpdate::Delta { text, .. } => write!(out, "{}", text)?,
        StreamUpdate::Completed { .. } => writeln!(out)?,
        StreamUpdate::Empty { message } | StreamUpdate::Failed { message } => {
            writeln!(out)?;
            eprintln!("{}", message);
        }
        StreamUpdate::Cancelled => {
            writeln!(out)?;
            eprintln!("[cancelled]");
        }
    }
    out.flush()?;
    Ok(())
}

fn prompt() -> Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "\n> ")?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_update_streams_text() {
        let mut out = Vec::new();

        print_update(&mut out, &StreamUpdate::Delta { text: "He".to_string(), append: false }).unwrap();
        print_update(&mut out, &StreamUpdate::Delta { text: "llo".to_string(), append: true }).unwrap();
        print_update(&mut out, &StreamUpdate::Completed { text: "Hello".to_string() }).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "Hello\n");
    }
}
