//! Terminal rendering of chat effects
//!
//! [`TerminalView`] prints the session to a writer (stdout in the binary).
//! Streamed replies are printed incrementally: each `MessageUpdated` carries
//! the full text so far, and only the part not yet printed is written.
//! This also holds for a reply already shown from history: a stream that
//! resumes it prints only the continuation.

use std::collections::HashMap;
use std::io::Write;

use colored::Colorize;

use crate::controller::ChatView;
use crate::protocol::{ChatMessage, MessageId, MessageKind};
use crate::reconciler::{Effect, MessageStatus};

/// [`ChatView`] that prints to a terminal.
#[derive(Debug)]
pub struct TerminalView<W: Write + Send = std::io::Stdout> {
    out: W,
    /// Message currently being printed and how many bytes of it are out
    streaming: Option<(MessageId, usize)>,
    /// Bytes already shown per assistant message in the current chat
    shown: HashMap<MessageId, usize>,
}

impl TerminalView {
    /// View printing to stdout.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalView<W> {
    /// View printing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            streaming: None,
            shown: HashMap::new(),
        }
    }

    /// Consume the view and return its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: impl std::fmt::Display) {
        self.finish_stream();
        let _ = writeln!(self.out, "{}", text);
    }

    fn print_message(&mut self, message: &ChatMessage) {
        match message.kind() {
            MessageKind::User => self.line(format!("{} {}", "you>".green().bold(), message.content)),
            MessageKind::Assistant => {
                self.shown
                    .insert(message.id.clone(), message.content.len());
                self.line(format!("{} {}", "assistant>".cyan().bold(), message.content))
            }
            MessageKind::Error => self.line(message.content.red()),
        }
    }

    fn finish_stream(&mut self) {
        if self.streaming.take().is_some() {
            let _ = writeln!(self.out);
        }
    }

    fn stream_update(&mut self, message_id: &MessageId, text: &str) {
        let printed = match &self.streaming {
            Some((id, printed)) if id == message_id => *printed,
            _ => {
                self.finish_stream();
                let shown = self.shown.get(message_id).copied().unwrap_or(0);
                if shown > 0 {
                    let _ = write!(self.out, "{} {}", "assistant>".cyan().bold(), "...".dimmed());
                } else {
                    let _ = write!(self.out, "{} ", "assistant>".cyan().bold());
                }
                shown
            }
        };

        // Text only grows; anything shorter means nothing new to show.
        if let Some(fresh) = text.get(printed..) {
            let _ = write!(self.out, "{}", fresh);
        }
        let printed = text.len().max(printed);
        self.shown.insert(message_id.clone(), printed);
        self.streaming = Some((message_id.clone(), printed));
        let _ = self.out.flush();
    }
}

impl<W: Write + Send> ChatView for TerminalView<W> {
    fn apply(&mut self, effect: &Effect) {
        match effect {
            Effect::Emit(_) => {}
            Effect::ActiveChatChanged(Some(chat_id)) => {
                self.line(format!("Joined chat {}", chat_id).bold())
            }
            Effect::ActiveChatChanged(None) => self.line("No chat open. Use /new or /open <id>.".yellow()),
            Effect::MessagesCleared => {
                self.finish_stream();
                self.shown.clear();
            }
            Effect::MessagesReplaced(messages) => {
                for message in messages {
                    self.print_message(message);
                }
            }
            Effect::MessageAppended(message) => {
                // Streamed entries start empty and are printed by updates.
                if message.kind() == MessageKind::Assistant && message.content.is_empty() {
                    return;
                }
                self.print_message(message);
            }
            Effect::MessageUpdated { message_id, text } => self.stream_update(message_id, text),
            Effect::StreamSealed { status, .. } => {
                self.finish_stream();
                if *status == MessageStatus::Complete {
                    let _ = self.out.flush();
                }
            }
            Effect::GeneratingChanged(_) => {}
            Effect::ChatAdded(summary) => {
                self.line(format!("Created chat {} ({})", summary.id, summary.title).green())
            }
            Effect::ChatRenamed { chat_id, title } => {
                self.line(format!("Renamed chat {} to {}", chat_id, title).green())
            }
            Effect::ChatRemoved(chat_id) => self.line(format!("Deleted chat {}", chat_id).green()),
        }
    }
}
