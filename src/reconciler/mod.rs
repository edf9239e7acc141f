//! Streaming message reconciliation
//!
//! [`StreamReconciler`] owns the client [`Session`] and assembles streamed
//! assistant replies out of `response_chunk`, `response_complete` and
//! `error` events, scoped to the active chat.
//!
//! # Design
//!
//! Every handler is a state transition that returns the [`Effect`]s it
//! requires instead of performing them. The reconciler holds no transport,
//! view or clock handle, so it is deterministic and trivially testable. An
//! adapter (see [`crate::controller`]) applies the effects.
//!
//! Guards are silent: events for another chat, chunks for sealed messages,
//! and late or duplicate completions produce no effects. A chat switch or
//! a late event is an expected race, not a fault. The only user-visible
//! failure is a server-reported generation error, which is rendered as a
//! new error entry in the message log.
//!
//! # Live message
//!
//! At most one message is live (Pending or Streaming) at a time. A local
//! send creates a Pending placeholder without an id; the first chunk binds
//! it to the server's message id. A chunk for a different message takes over
//! the live slot and the previous live message is sealed as Complete.
//!
//! # Example
//!
//! ```
//! use chatwire::protocol::{ChatId, ChatType, MessageId, ResponseChunk, ResponseComplete};
//! use chatwire::reconciler::{MessageStatus, StreamReconciler};
//!
//! let chat = ChatId::new("chat1");
//! let mut reconciler = StreamReconciler::new();
//! reconciler.on_chat_switch(chat.clone());
//!
//! let sent = reconciler.on_send(Some(&chat), "Hi", ChatType::General).unwrap();
//! assert_eq!(sent.message.status(), MessageStatus::Pending);
//!
//! reconciler.on_chunk(ResponseChunk {
//!     chat_id: chat.clone(),
//!     message_id: MessageId::new("m1"),
//!     chunk: "Hello".to_string(),
//! });
//! reconciler.on_complete(ResponseComplete { chat_id: chat, message_id: None });
//!
//! let message = reconciler.message(&MessageId::new("m1")).unwrap();
//! assert_eq!(message.text(), "Hello");
//! assert_eq!(message.status(), MessageStatus::Complete);
//! assert!(!reconciler.session().is_generating);
//! ```

pub mod effect;
pub mod session;

use std::collections::HashMap;

pub use effect::Effect;
pub use session::{MessageStatus, Session, StreamingMessage};

use crate::protocol::{
    ChatId, ChatMessage, ChatType, ErrorEvent, InboundEvent, MessageId, NewMessage, OutboundEvent,
    ResponseChunk, ResponseComplete,
};

/// Result of a successful [`StreamReconciler::on_send`].
#[derive(Debug, Clone, PartialEq)]
pub struct SendOutcome {
    /// The Pending placeholder for the expected reply
    pub message: StreamingMessage,
    /// Effects to apply (the `send_message` emit and the generating flag)
    pub effects: Vec<Effect>,
}

/// Session-scoped tracker for streamed assistant replies.
#[derive(Debug, Default)]
pub struct StreamReconciler {
    session: Session,
    /// Placeholder for the reply to a local send, until its first chunk
    pending: Option<StreamingMessage>,
    /// Placeholder sealed by a stop before its first chunk. The next unseen
    /// message id in the chat is the stopped reply and binds to it.
    stopped: Option<StreamingMessage>,
    /// Every message that received a chunk, sealed or not
    streams: HashMap<MessageId, StreamingMessage>,
    /// Id of the bound live message, if any
    live: Option<MessageId>,
    /// Rendered message log of the active chat
    log: Vec<ChatMessage>,
}

impl StreamReconciler {
    /// Create a reconciler with no active chat.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current session state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Rendered message log of the active chat, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.log
    }

    /// Streaming state for a message id.
    pub fn message(&self, id: &MessageId) -> Option<&StreamingMessage> {
        self.streams.get(id)
    }

    /// The live message (Pending or Streaming), if any.
    pub fn live_message(&self) -> Option<&StreamingMessage> {
        self.pending
            .as_ref()
            .or_else(|| self.live.as_ref().and_then(|id| self.streams.get(id)))
    }

    /// Dispatch an inbound transport event to its handler.
    pub fn handle(&mut self, event: InboundEvent) -> Vec<Effect> {
        match event {
            InboundEvent::NewMessage(message) => self.on_new_message(message),
            InboundEvent::ResponseChunk(chunk) => self.on_chunk(chunk),
            InboundEvent::ResponseComplete(complete) => self.on_complete(complete),
            InboundEvent::Error(error) => self.on_error(error),
        }
    }

    /// Submit a user message to the active chat.
    ///
    /// Creates a Pending placeholder for the reply, raises the generating
    /// flag and requests a `send_message` emit.
    ///
    /// Returns `None` without touching state when the trimmed content is
    /// empty, the chat id is absent or not the active chat, or a reply is
    /// already in flight.
    pub fn on_send(
        &mut self,
        chat_id: Option<&ChatId>,
        content: &str,
        chat_type: ChatType,
    ) -> Option<SendOutcome> {
        let content = content.trim();
        let chat_id = match chat_id {
            Some(id) if !id.as_str().is_empty() => id,
            _ => {
                tracing::debug!("Ignoring send without a target chat");
                return None;
            }
        };
        if content.is_empty() {
            tracing::debug!("Ignoring empty message for chat {}", chat_id);
            return None;
        }
        if !self.session.is_active(chat_id) {
            tracing::debug!("Ignoring send to inactive chat {}", chat_id);
            return None;
        }
        if self.session.is_generating {
            tracing::debug!("Ignoring send while a reply is in flight in chat {}", chat_id);
            return None;
        }

        let message = StreamingMessage::pending(chat_id.clone());
        self.pending = Some(message.clone());
        self.stopped = None;
        self.session.is_generating = true;

        Some(SendOutcome {
            message,
            effects: vec![
                Effect::Emit(OutboundEvent::SendMessage {
                    chat_id: chat_id.clone(),
                    content: content.to_string(),
                    chat_type,
                }),
                Effect::GeneratingChanged(true),
            ],
        })
    }

    /// Apply one streamed fragment.
    pub fn on_chunk(&mut self, event: ResponseChunk) -> Vec<Effect> {
        let ResponseChunk {
            chat_id,
            message_id,
            chunk,
        } = event;

        if !self.session.is_active(&chat_id) {
            tracing::debug!(
                "Discarding chunk for message {} of inactive chat {}",
                message_id,
                chat_id
            );
            return Vec::new();
        }
        if self
            .streams
            .get(&message_id)
            .is_some_and(|m| m.status().is_sealed())
        {
            tracing::debug!("Discarding chunk for sealed message {}", message_id);
            return Vec::new();
        }

        if !self.streams.contains_key(&message_id) {
            if let Some(mut stopped) = self.stopped.take() {
                tracing::debug!("Discarding chunk for stopped message {}", message_id);
                stopped.bind(message_id.clone());
                self.streams.insert(message_id, stopped);
                return Vec::new();
            }
        }

        let mut effects = Vec::new();

        if self.live.as_ref() != Some(&message_id) {
            if !self.streams.contains_key(&message_id) {
                let message = match self.pending.take() {
                    Some(mut pending) => {
                        pending.bind(message_id.clone());
                        pending
                    }
                    None => StreamingMessage::discovered(chat_id.clone(), message_id.clone()),
                };
                self.streams.insert(message_id.clone(), message);
            }
            // Whatever still holds the live slot is superseded.
            if let Some(effect) = self.seal_live(MessageStatus::Complete) {
                effects.push(effect);
            }
            self.live = Some(message_id.clone());
        }

        let Some(message) = self.streams.get_mut(&message_id) else {
            return effects;
        };

        match self.log.iter().find(|m| m.id == message_id) {
            Some(entry) => message.catch_up(&entry.content),
            None => {
                let entry = ChatMessage::assistant(message_id.clone(), "");
                self.log.push(entry.clone());
                effects.push(Effect::MessageAppended(entry));
            }
        }

        message.append(&chunk);
        let text = message.text().to_string();
        if let Some(entry) = self.log.iter_mut().find(|m| m.id == message_id) {
            entry.content.clone_from(&text);
        }

        if !self.session.is_generating {
            self.session.is_generating = true;
            effects.push(Effect::GeneratingChanged(true));
        }
        effects.push(Effect::MessageUpdated { message_id, text });
        effects
    }

    /// Finish the live message.
    ///
    /// A completion naming a message other than the live one, or arriving
    /// when nothing is live (after a stop or a chat switch), is a no-op.
    pub fn on_complete(&mut self, event: ResponseComplete) -> Vec<Effect> {
        if !self.session.is_active(&event.chat_id) {
            tracing::debug!("Discarding completion for inactive chat {}", event.chat_id);
            return Vec::new();
        }
        if let Some(done) = event.message_id.as_ref() {
            let is_other_live = self.live.as_ref().is_some_and(|live| live != done);
            let is_sealed = self
                .streams
                .get(done)
                .is_some_and(|m| m.status().is_sealed());
            if is_other_live || is_sealed {
                tracing::debug!("Discarding stale completion for message {}", done);
                return Vec::new();
            }
        }

        self.stopped = None;
        let mut effects = Vec::new();
        match self.seal_live(MessageStatus::Complete) {
            Some(effect) => effects.push(effect),
            None => tracing::debug!("Completion in chat {} with no live message", event.chat_id),
        }
        self.finish_generation(&mut effects);
        effects
    }

    /// Record a server-reported generation failure.
    ///
    /// The live message (if any) is sealed as Errored and a separate error
    /// entry carrying the failure text is appended to the log.
    pub fn on_error(&mut self, event: ErrorEvent) -> Vec<Effect> {
        if !self.session.is_active(&event.chat_id) {
            tracing::debug!("Discarding error for inactive chat {}", event.chat_id);
            return Vec::new();
        }
        tracing::warn!("Server reported generation error: {}", event.error);
        self.stopped = None;

        let mut effects = Vec::new();
        if let Some(effect) = self.seal_live(MessageStatus::Errored) {
            effects.push(effect);
        }
        self.finish_generation(&mut effects);

        let entry = ChatMessage::generation_error(&event.error);
        self.log.push(entry.clone());
        effects.push(Effect::MessageAppended(entry));
        effects
    }

    /// Make `new_chat_id` the active chat.
    ///
    /// The previous chat's live message is abandoned: it stays known (so its
    /// late events are recognised) but is no longer live, and events for it
    /// are discarded by the chat guard while another chat is active.
    pub fn on_chat_switch(&mut self, new_chat_id: ChatId) -> Vec<Effect> {
        let mut effects = Vec::new();

        let previous = self.session.active_chat_id.replace(new_chat_id.clone());
        if let Some(previous) = previous.filter(|p| *p != new_chat_id) {
            effects.push(Effect::Emit(OutboundEvent::LeaveChat { chat_id: previous }));
        }

        self.abandon_live(&mut effects);
        self.log.clear();

        effects.push(Effect::ActiveChatChanged(Some(new_chat_id.clone())));
        effects.push(Effect::MessagesCleared);
        effects.push(Effect::Emit(OutboundEvent::JoinChat {
            chat_id: new_chat_id,
        }));
        effects
    }

    /// Request that the in-flight reply stop.
    ///
    /// Emits `stop_generation` once and seals the live message as Complete
    /// without waiting for the server. A reply stopped before its first
    /// chunk stays sealed when its chunks and completion arrive later.
    pub fn on_stop(&mut self, chat_id: &ChatId) -> Vec<Effect> {
        if !self.session.is_active(chat_id) || !self.session.is_generating {
            tracing::debug!("Ignoring stop for chat {}: nothing is generating", chat_id);
            return Vec::new();
        }

        let mut effects = vec![Effect::Emit(OutboundEvent::StopGeneration {
            chat_id: chat_id.clone(),
        })];
        if let Some(mut pending) = self.pending.take() {
            pending.seal(MessageStatus::Complete);
            self.stopped = Some(pending);
            effects.push(Effect::StreamSealed {
                message_id: None,
                status: MessageStatus::Complete,
            });
        } else if let Some(effect) = self.seal_live(MessageStatus::Complete) {
            effects.push(effect);
        }
        self.finish_generation(&mut effects);
        effects
    }

    /// Append a complete message broadcast by the server.
    ///
    /// Messages without a chat id are attributed to the active chat.
    /// Ids already in the log are ignored.
    pub fn on_new_message(&mut self, message: NewMessage) -> Vec<Effect> {
        let belongs = match message.chat_id.as_ref() {
            Some(chat_id) => self.session.is_active(chat_id),
            None => self.session.active_chat_id.is_some(),
        };
        if !belongs {
            tracing::debug!("Discarding message {} for inactive chat", message.id);
            return Vec::new();
        }
        if self.log.iter().any(|m| m.id == message.id) {
            tracing::debug!("Ignoring duplicate message {}", message.id);
            return Vec::new();
        }

        let entry = ChatMessage::from(message);
        self.log.push(entry.clone());
        vec![Effect::MessageAppended(entry)]
    }

    /// Replace the log with the server history of the active chat.
    ///
    /// Known streams that appear in the history are brought up to date with
    /// it, and vice versa, whichever text is further along.
    pub fn on_history_loaded(&mut self, chat_id: &ChatId, messages: Vec<ChatMessage>) -> Vec<Effect> {
        if !self.session.is_active(chat_id) {
            tracing::debug!("Discarding history for inactive chat {}", chat_id);
            return Vec::new();
        }

        self.log = messages;
        for entry in &mut self.log {
            if let Some(stream) = self.streams.get_mut(&entry.id) {
                if !stream.status().is_sealed() {
                    stream.catch_up(&entry.content);
                }
                if stream.text().len() > entry.content.len() {
                    entry.content = stream.text().to_string();
                }
            }
        }

        vec![Effect::MessagesReplaced(self.log.clone())]
    }

    /// Forget a chat that was deleted on the server.
    pub fn on_chat_deleted(&mut self, chat_id: &ChatId) -> Vec<Effect> {
        let mut effects = Vec::new();

        self.streams.retain(|_, m| m.chat_id() != chat_id);
        if self.session.is_active(chat_id) {
            self.abandon_live(&mut effects);
            self.session.active_chat_id = None;
            self.log.clear();
            effects.push(Effect::ActiveChatChanged(None));
            effects.push(Effect::MessagesCleared);
        }

        effects.push(Effect::ChatRemoved(chat_id.clone()));
        effects
    }

    /// Seal whatever holds the live slot.
    fn seal_live(&mut self, status: MessageStatus) -> Option<Effect> {
        if let Some(mut pending) = self.pending.take() {
            pending.seal(status);
            return Some(Effect::StreamSealed {
                message_id: None,
                status,
            });
        }

        let id = self.live.take()?;
        if let Some(message) = self.streams.get_mut(&id) {
            message.seal(status);
        }
        Some(Effect::StreamSealed {
            message_id: Some(id),
            status,
        })
    }

    /// Release the live slot without sealing.
    fn abandon_live(&mut self, effects: &mut Vec<Effect>) {
        self.pending = None;
        self.stopped = None;
        self.live = None;
        self.finish_generation(effects);
    }

    fn finish_generation(&mut self, effects: &mut Vec<Effect>) {
        if self.session.is_generating {
            self.session.is_generating = false;
            effects.push(Effect::GeneratingChanged(false));
        }
    }
}
