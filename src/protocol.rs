//! Wire types for the realtime chat channel and the REST collaborator
//!
//! Every realtime frame is a JSON envelope of the form
//! `{"event": "<name>", "data": {...}}`. Inbound frames decode into
//! [`InboundEvent`]; outbound frames are built from [`OutboundEvent`].
//!
//! # Identifiers
//!
//! Servers in the wild send chat and message ids either as JSON numbers
//! (database row ids) or as strings. [`ChatId`] and [`MessageId`] accept
//! both and keep the id as a string internally. Ids made only of digits are
//! written back as JSON numbers so the server sees the same type it sent.
//!
//! # Timestamps
//!
//! Timestamps are accepted as RFC 3339 or as naive ISO 8601 without an
//! offset (assumed UTC), which is what `datetime.isoformat()` style servers
//! emit.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ChatwireError, Result};

/// Raw id as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    fn from_text(text: String) -> Self {
        match text.parse::<u64>() {
            Ok(n) if n.to_string() == text => Self::Number(n),
            _ => Self::Text(text),
        }
    }

    fn into_text(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

/// Identifier of a chat (one conversation channel).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawId", into = "RawId")]
pub struct ChatId(String);

impl ChatId {
    /// Create a chat id from any string-like value.
    ///
    /// # Examples
    ///
    /// ```
    /// use chatwire::protocol::ChatId;
    ///
    /// let id = ChatId::new("chat1");
    /// assert_eq!(id.as_str(), "chat1");
    /// ```
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<RawId> for ChatId {
    fn from(raw: RawId) -> Self {
        Self(raw.into_text())
    }
}

impl From<ChatId> for RawId {
    fn from(id: ChatId) -> Self {
        RawId::from_text(id.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChatId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identifier of a single message within a chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawId", into = "RawId")]
pub struct MessageId(String);

impl MessageId {
    /// Create a message id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a client-local id for messages the server never saw
    /// (for example rendered generation errors).
    ///
    /// Local ids carry a `local-` prefix so they can never collide with a
    /// numeric server id.
    pub fn local() -> Self {
        Self(format!("local-{}", ulid::Ulid::new()))
    }

    /// Returns true when the id was generated by [`MessageId::local`].
    pub fn is_local(&self) -> bool {
        self.0.starts_with("local-")
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<RawId> for MessageId {
    fn from(raw: RawId) -> Self {
        Self(raw.into_text())
    }
}

impl From<MessageId> for RawId {
    fn from(id: MessageId) -> Self {
        RawId::from_text(id.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Kind of conversation a chat runs.
///
/// Sent with every `send_message` so the server can route the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    /// General purpose assistant conversation
    #[default]
    General,
    /// Music library questions answered from the server's catalogue
    Music,
}

impl ChatType {
    /// Parse a chat type from a string (case-insensitive)
    ///
    /// # Examples
    ///
    /// ```
    /// use chatwire::protocol::ChatType;
    ///
    /// assert_eq!(ChatType::parse_str("Music").unwrap(), ChatType::Music);
    /// assert!(ChatType::parse_str("poetry").is_err());
    /// ```
    pub fn parse_str(s: &str) -> std::result::Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "general" => Ok(Self::General),
            "music" => Ok(Self::Music),
            other => Err(format!("Unknown chat type: {}", other)),
        }
    }

    /// Wire name of the chat type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Music => "music",
        }
    }
}

impl fmt::Display for ChatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deserialize a timestamp given either as RFC 3339 or as naive ISO 8601.
fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

/// Parse a server timestamp.
///
/// # Errors
///
/// Returns a description of the failure when the value is neither RFC 3339
/// nor naive ISO 8601.
pub fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid timestamp {:?}: {}", raw, e))
}

/// Who authored a rendered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Typed by the local user
    User,
    /// Produced by the assistant (streamed or broadcast)
    Assistant,
    /// Synthesized by the client from a server-reported generation error
    Error,
}

/// One entry of the rendered message log.
///
/// Also the record shape returned by `GET /api/chats/{id}/messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Server id, or a local id for synthesized entries
    pub id: MessageId,
    /// Message text
    pub content: String,
    /// When the message was created
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// True when the local user authored the message
    pub is_user: bool,
    /// True for client-synthesized generation error entries
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ChatMessage {
    /// Build the error entry appended when the server reports a failed
    /// generation. The content is rendered as `Error: <text>`.
    pub fn generation_error(error: &str) -> Self {
        Self {
            id: MessageId::local(),
            content: format!("Error: {}", error),
            timestamp: Utc::now(),
            is_user: false,
            is_error: true,
        }
    }

    /// Build an assistant entry for a response that is being streamed.
    pub fn assistant(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            timestamp: Utc::now(),
            is_user: false,
            is_error: false,
        }
    }

    /// Who authored this message.
    pub fn kind(&self) -> MessageKind {
        if self.is_error {
            MessageKind::Error
        } else if self.is_user {
            MessageKind::User
        } else {
            MessageKind::Assistant
        }
    }
}

/// Chat record returned by `POST /api/chats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSummary {
    /// Chat id assigned by the server
    pub id: ChatId,
    /// Display title
    pub title: String,
    /// Chat type, when the server echoes it
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub chat_type: Option<ChatType>,
    /// Creation time as sent by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Inbound events
// ---------------------------------------------------------------------------

/// Payload of `new_message`: a complete message broadcast to the chat room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    /// Message id
    pub id: MessageId,
    /// Message text
    pub content: String,
    /// Creation time
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// True when the message was authored by a user
    pub is_user: bool,
    /// Owning chat; servers that broadcast per room may omit it
    #[serde(default)]
    pub chat_id: Option<ChatId>,
}

impl From<NewMessage> for ChatMessage {
    fn from(message: NewMessage) -> Self {
        Self {
            id: message.id,
            content: message.content,
            timestamp: message.timestamp,
            is_user: message.is_user,
            is_error: false,
        }
    }
}

/// Payload of `response_chunk`: one fragment of a streamed assistant reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseChunk {
    /// Chat the reply belongs to
    pub chat_id: ChatId,
    /// Assistant message being streamed
    pub message_id: MessageId,
    /// Text fragment to append
    pub chunk: String,
}

/// Payload of `response_complete`: the streamed reply finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseComplete {
    /// Chat the reply belongs to
    pub chat_id: ChatId,
    /// Finished message, when the server includes it
    #[serde(default)]
    pub message_id: Option<MessageId>,
}

/// Payload of `error`: generation failed on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// Chat whose generation failed
    pub chat_id: ChatId,
    /// Human readable failure text
    pub error: String,
}

/// Events pushed by the server over the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A complete message was added to the chat
    NewMessage(NewMessage),
    /// A fragment of a streamed reply
    ResponseChunk(ResponseChunk),
    /// A streamed reply finished
    ResponseComplete(ResponseComplete),
    /// Generation failed
    Error(ErrorEvent),
}

impl InboundEvent {
    /// Decode a raw realtime frame.
    ///
    /// # Errors
    ///
    /// Returns [`ChatwireError::Protocol`] when the frame is not valid JSON
    /// or names an unknown event.
    ///
    /// # Examples
    ///
    /// ```
    /// use chatwire::protocol::InboundEvent;
    ///
    /// let raw = r#"{"event":"response_chunk","data":{"chat_id":3,"message_id":9,"chunk":"Hi"}}"#;
    /// let event = InboundEvent::decode(raw).unwrap();
    /// assert_eq!(event.chat_id().unwrap().as_str(), "3");
    /// ```
    pub fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| {
            ChatwireError::Protocol(format!("failed to decode inbound event: {}", e)).into()
        })
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewMessage(_) => "new_message",
            Self::ResponseChunk(_) => "response_chunk",
            Self::ResponseComplete(_) => "response_complete",
            Self::Error(_) => "error",
        }
    }

    /// Chat the event is addressed to, if the payload names one.
    pub fn chat_id(&self) -> Option<&ChatId> {
        match self {
            Self::NewMessage(m) => m.chat_id.as_ref(),
            Self::ResponseChunk(c) => Some(&c.chat_id),
            Self::ResponseComplete(c) => Some(&c.chat_id),
            Self::Error(e) => Some(&e.chat_id),
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound events
// ---------------------------------------------------------------------------

/// Events the client sends over the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Subscribe to a chat room's events
    JoinChat {
        /// Chat to join
        chat_id: ChatId,
    },
    /// Unsubscribe from a chat room's events
    LeaveChat {
        /// Chat to leave
        chat_id: ChatId,
    },
    /// Submit a user message and request a reply
    SendMessage {
        /// Target chat
        chat_id: ChatId,
        /// Message text
        content: String,
        /// Chat type used to route the prompt
        #[serde(rename = "type")]
        chat_type: ChatType,
    },
    /// Ask the server to stop the in-flight reply
    StopGeneration {
        /// Chat whose generation should stop
        chat_id: ChatId,
    },
}

impl OutboundEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinChat { .. } => "join_chat",
            Self::LeaveChat { .. } => "leave_chat",
            Self::SendMessage { .. } => "send_message",
            Self::StopGeneration { .. } => "stop_generation",
        }
    }

    /// Serialize the event into a realtime frame.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the payload cannot be encoded.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self).map_err(ChatwireError::from)?)
    }
}
