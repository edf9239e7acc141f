//! Session and streaming message state

use std::fmt;

use crate::protocol::{ChatId, MessageId};

/// The chat channel the user is currently viewing.
///
/// Exactly one session exists per reconciler. It is mutated by user actions
/// (switch chat, send, stop) and by server events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Chat whose events are applied; `None` before the first chat is opened
    pub active_chat_id: Option<ChatId>,
    /// True while an assistant reply is expected or streaming
    pub is_generating: bool,
}

impl Session {
    /// Returns true when `chat_id` is the active chat.
    pub fn is_active(&self, chat_id: &ChatId) -> bool {
        self.active_chat_id.as_ref() == Some(chat_id)
    }
}

/// Lifecycle of an assistant message under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    /// Prompt sent, no chunk received yet
    Pending,
    /// At least one chunk applied
    Streaming,
    /// Finished (server completion or local stop)
    Complete,
    /// Server reported a generation error
    Errored,
}

impl MessageStatus {
    /// Complete and Errored messages accept no further chunks.
    pub fn is_sealed(&self) -> bool {
        matches!(self, Self::Complete | Self::Errored)
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Streaming => write!(f, "streaming"),
            Self::Complete => write!(f, "complete"),
            Self::Errored => write!(f, "errored"),
        }
    }
}

/// An assistant message being assembled from chunks.
///
/// The server assigns the message id, so a message created by a local send
/// starts without one and is bound to an id by its first chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamingMessage {
    message_id: Option<MessageId>,
    chat_id: ChatId,
    accumulated_text: String,
    status: MessageStatus,
}

impl StreamingMessage {
    /// A message awaiting the first chunk of the reply to a local send.
    pub(crate) fn pending(chat_id: ChatId) -> Self {
        Self {
            message_id: None,
            chat_id,
            accumulated_text: String::new(),
            status: MessageStatus::Pending,
        }
    }

    /// A message first seen through a chunk (no local send preceded it).
    pub(crate) fn discovered(chat_id: ChatId, message_id: MessageId) -> Self {
        Self {
            message_id: Some(message_id),
            chat_id,
            accumulated_text: String::new(),
            status: MessageStatus::Pending,
        }
    }

    /// Server id, once known.
    pub fn message_id(&self) -> Option<&MessageId> {
        self.message_id.as_ref()
    }

    /// Owning chat.
    pub fn chat_id(&self) -> &ChatId {
        &self.chat_id
    }

    /// Text received so far.
    pub fn text(&self) -> &str {
        &self.accumulated_text
    }

    /// Current lifecycle state.
    pub fn status(&self) -> MessageStatus {
        self.status
    }

    pub(crate) fn bind(&mut self, message_id: MessageId) {
        self.message_id = Some(message_id);
    }

    /// Append a chunk, moving Pending to Streaming.
    ///
    /// Returns false (and changes nothing) once the message is sealed.
    pub(crate) fn append(&mut self, chunk: &str) -> bool {
        if self.status.is_sealed() {
            return false;
        }
        self.status = MessageStatus::Streaming;
        self.accumulated_text.push_str(chunk);
        true
    }

    /// Adopt `known` as the text so far when it extends what we have.
    ///
    /// Used when reattaching to a stream whose earlier chunks arrived while
    /// another chat was active. Text never shrinks or diverges.
    pub(crate) fn catch_up(&mut self, known: &str) {
        if known.len() > self.accumulated_text.len() && known.starts_with(&self.accumulated_text)
        {
            self.accumulated_text = known.to_string();
        }
    }

    pub(crate) fn seal(&mut self, status: MessageStatus) {
        debug_assert!(status.is_sealed());
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_message_has_no_id() {
        let message = StreamingMessage::pending(ChatId::new("c1"));
        assert!(message.message_id().is_none());
        assert_eq!(message.status(), MessageStatus::Pending);
        assert_eq!(message.text(), "");
    }

    #[test]
    fn test_append_moves_to_streaming() {
        let mut message = StreamingMessage::discovered(ChatId::new("c1"), MessageId::new("m1"));
        assert!(message.append("He"));
        assert!(message.append("llo"));
        assert_eq!(message.status(), MessageStatus::Streaming);
        assert_eq!(message.text(), "Hello");
    }

    #[test]
    fn test_append_after_seal_is_rejected() {
        let mut message = StreamingMessage::pending(ChatId::new("c1"));
        message.append("done");
        message.seal(MessageStatus::Errored);
        assert!(!message.append(" more"));
        assert_eq!(message.text(), "done");
        assert_eq!(message.status(), MessageStatus::Errored);
    }

    #[test]
    fn test_catch_up_only_extends() {
        let mut message = StreamingMessage::pending(ChatId::new("c1"));
        message.append("Hel");
        message.catch_up("He");
        assert_eq!(message.text(), "Hel");
        message.catch_up("Goodbye");
        assert_eq!(message.text(), "Hel");
        message.catch_up("Hello, wor");
        assert_eq!(message.text(), "Hello, wor");
    }

    #[test]
    fn test_session_is_active() {
        let session = Session {
            active_chat_id: Some(ChatId::new("a")),
            is_generating: false,
        };
        assert!(session.is_active(&ChatId::new("a")));
        assert!(!session.is_active(&ChatId::new("b")));
        assert!(!Session::default().is_active(&ChatId::new("a")));
    }

    #[test]
    fn test_status_sealed() {
        assert!(!MessageStatus::Pending.is_sealed());
        assert!(!MessageStatus::Streaming.is_sealed());
        assert!(MessageStatus::Complete.is_sealed());
        assert!(MessageStatus::Errored.is_sealed());
        assert_eq!(MessageStatus::Errored.to_string(), "errored");
    }
}
