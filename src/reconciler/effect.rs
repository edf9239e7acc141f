//! Effect descriptions produced by the reconciler
//!
//! The reconciler never touches the transport or the screen. Each handler
//! returns a list of [`Effect`] values that an adapter applies in order:
//! [`Effect::Emit`] goes to the realtime transport, everything else to the
//! view.

use crate::protocol::{ChatId, ChatMessage, ChatSummary, MessageId, OutboundEvent};
use crate::reconciler::MessageStatus;

/// A single side effect requested by a state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send an event on the realtime channel
    Emit(OutboundEvent),
    /// The active chat changed (`None` after the active chat was deleted)
    ActiveChatChanged(Option<ChatId>),
    /// Drop every rendered message
    MessagesCleared,
    /// Replace the rendered log with a loaded history
    MessagesReplaced(Vec<ChatMessage>),
    /// Render a new message at the end of the log
    MessageAppended(ChatMessage),
    /// A streamed message grew; `text` is the full text so far
    MessageUpdated {
        /// Message being streamed
        message_id: MessageId,
        /// Complete text received so far
        text: String,
    },
    /// The live message stopped accepting chunks
    StreamSealed {
        /// Sealed message, `None` when no chunk ever bound an id
        message_id: Option<MessageId>,
        /// Final status (Complete or Errored)
        status: MessageStatus,
    },
    /// Generation started or stopped; drives the stop control and input lock
    GeneratingChanged(bool),
    /// A chat was created and belongs at the top of the chat list
    ChatAdded(ChatSummary),
    /// A chat title changed
    ChatRenamed {
        /// Renamed chat
        chat_id: ChatId,
        /// New title
        title: String,
    },
    /// A chat was deleted
    ChatRemoved(ChatId),
}

impl Effect {
    /// Returns the outbound event when this effect targets the transport.
    pub fn as_emit(&self) -> Option<&OutboundEvent> {
        match self {
            Self::Emit(event) => Some(event),
            _ => None,
        }
    }
}
