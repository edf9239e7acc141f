//! Chat controller: the adapter between the reconciler and the outside world
//!
//! [`ChatController`] owns the [`StreamReconciler`] and its collaborators.
//! User actions and inbound frames are turned into reconciler transitions;
//! the resulting effects are applied in order, `Emit` effects to the
//! [`Transport`] and all others to the [`ChatView`].
//!
//! [`ChatController::run`] is the event loop. It handles one inbound frame
//! or one [`ControllerCommand`] at a time, to completion, until the command
//! channel closes, the event stream ends, or the cancellation token fires.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::ChatApi;
use crate::error::{ChatwireError, Result};
use crate::protocol::{ChatId, ChatSummary, ChatType, ErrorEvent, InboundEvent};
use crate::reconciler::{Effect, StreamReconciler};
use crate::store::LastChatStore;
use crate::transport::Transport;

/// Receiver of view effects.
///
/// Implementations render the session: a terminal printer in the binary, a
/// recording vector in tests.
pub trait ChatView: Send {
    /// Apply one effect. Called in the order effects were produced.
    fn apply(&mut self, effect: &Effect);
}

/// A user action forwarded to the event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerCommand {
    /// Send a message to the active chat
    Send(String),
    /// Stop the in-flight reply
    Stop,
    /// Create a chat (of the given type, or the current one) and open it
    NewChat(Option<ChatType>),
    /// Open an existing chat
    Open(ChatId),
    /// Rename a chat
    Rename {
        /// Chat to rename
        chat_id: ChatId,
        /// New title
        title: String,
    },
    /// Delete a chat
    Delete(ChatId),
    /// Change the chat type used for new chats and messages
    SetType(ChatType),
}

/// Drives a chat session against a server.
pub struct ChatController<V: ChatView> {
    reconciler: StreamReconciler,
    transport: Arc<dyn Transport>,
    api: ChatApi,
    store: LastChatStore,
    view: V,
    chat_type: ChatType,
}

impl<V: ChatView> std::fmt::Debug for ChatController<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatController")
            .field("session", self.reconciler.session())
            .field("chat_type", &self.chat_type)
            .finish_non_exhaustive()
    }
}

impl<V: ChatView> ChatController<V> {
    /// Assemble a controller. No I/O happens until a method is called.
    pub fn new(
        transport: Arc<dyn Transport>,
        api: ChatApi,
        store: LastChatStore,
        view: V,
        chat_type: ChatType,
    ) -> Self {
        Self {
            reconciler: StreamReconciler::new(),
            transport,
            api,
            store,
            view,
            chat_type,
        }
    }

    /// Reconciler state, for inspection.
    pub fn reconciler(&self) -> &StreamReconciler {
        &self.reconciler
    }

    /// The view effects are applied to.
    pub fn view(&self) -> &V {
        &self.view
    }

    /// Chat type used for new chats and outgoing messages.
    pub fn chat_type(&self) -> ChatType {
        self.chat_type
    }

    /// Change the chat type used for new chats and outgoing messages.
    pub fn set_chat_type(&mut self, chat_type: ChatType) {
        tracing::debug!("Chat type set to {}", chat_type);
        self.chat_type = chat_type;
    }

    /// Apply effects in order.
    ///
    /// Every effect is applied even if an emit fails; the first emit
    /// failure is returned.
    async fn apply(&mut self, effects: Vec<Effect>) -> Result<()> {
        let mut first_error = None;
        for effect in effects {
            match effect {
                Effect::Emit(event) => {
                    let name = event.name();
                    let sent = match event.encode() {
                        Ok(frame) => self.transport.send(frame).await,
                        Err(e) => Err(e),
                    };
                    match sent {
                        Ok(()) => tracing::debug!("Sent {}", name),
                        Err(e) => {
                            tracing::error!("Failed to send {}: {:#}", name, e);
                            first_error.get_or_insert(e);
                        }
                    }
                }
                other => self.view.apply(&other),
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Create a chat on the server and open it.
    pub async fn create_chat(&mut self, chat_type: Option<ChatType>) -> Result<ChatSummary> {
        let chat_type = chat_type.unwrap_or(self.chat_type);
        let summary = self.api.create_chat(chat_type).await?;
        tracing::info!("Created chat {} ({})", summary.id, summary.title);

        self.view.apply(&Effect::ChatAdded(summary.clone()));
        self.load_chat(summary.id.clone()).await?;
        Ok(summary)
    }

    /// Open a chat: fetch its history, switch to it and join its room.
    ///
    /// Nothing changes when the history cannot be fetched.
    pub async fn load_chat(&mut self, chat_id: ChatId) -> Result<()> {
        let history = self.api.list_messages(&chat_id).await?;

        let effects = self.reconciler.on_chat_switch(chat_id.clone());
        let joined = self.apply(effects).await;
        self.store.save(&chat_id);

        let effects = self.reconciler.on_history_loaded(&chat_id, history);
        self.apply(effects).await?;
        joined
    }

    /// Reopen `requested`, or the last active chat when none is given.
    ///
    /// A remembered chat that no longer exists is forgotten. Returns whether
    /// a chat was opened.
    pub async fn restore(&mut self, requested: Option<ChatId>) -> Result<bool> {
        let remembered = requested.is_none();
        let Some(chat_id) = requested.or_else(|| self.store.load()) else {
            return Ok(false);
        };

        match self.load_chat(chat_id.clone()).await {
            Ok(()) => Ok(true),
            Err(e)
                if remembered
                    && matches!(
                        e.downcast_ref::<ChatwireError>(),
                        Some(ChatwireError::NotFound(_))
                    ) =>
            {
                tracing::warn!("Last chat {} no longer exists", chat_id);
                self.store.clear();
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Rename a chat. The title is trimmed; an empty title is a no-op.
    pub async fn rename_chat(&mut self, chat_id: ChatId, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            tracing::debug!("Ignoring empty title for chat {}", chat_id);
            return Ok(());
        }

        self.api.rename_chat(&chat_id, title).await?;
        self.view.apply(&Effect::ChatRenamed {
            chat_id,
            title: title.to_string(),
        });
        Ok(())
    }

    /// Delete a chat on the server and forget it locally.
    pub async fn delete_chat(&mut self, chat_id: ChatId) -> Result<()> {
        self.api.delete_chat(&chat_id).await?;

        if self.reconciler.session().is_active(&chat_id) || self.store.load() == Some(chat_id.clone())
        {
            self.store.clear();
        }
        let effects = self.reconciler.on_chat_deleted(&chat_id);
        self.apply(effects).await
    }

    /// Send a message to the active chat.
    ///
    /// Returns `false` when the reconciler declined the send (empty input,
    /// no active chat, or a reply already in flight). If the frame cannot be
    /// delivered the pending reply is failed locally, so the session does
    /// not stay stuck in the generating state.
    pub async fn send_message(&mut self, content: &str) -> Result<bool> {
        let active = self.reconciler.session().active_chat_id.clone();
        let Some(outcome) = self
            .reconciler
            .on_send(active.as_ref(), content, self.chat_type)
        else {
            return Ok(false);
        };

        if let Err(e) = self.apply(outcome.effects).await {
            if let Some(chat_id) = active {
                let effects = self.reconciler.on_error(ErrorEvent {
                    chat_id,
                    error: format!("message not sent: {}", e),
                });
                // Purely local effects; nothing to emit.
                let _ = self.apply(effects).await;
            }
            return Err(e);
        }
        Ok(true)
    }

    /// Stop the in-flight reply of the active chat.
    pub async fn stop_generation(&mut self) -> Result<()> {
        let Some(chat_id) = self.reconciler.session().active_chat_id.clone() else {
            return Ok(());
        };
        let effects = self.reconciler.on_stop(&chat_id);
        self.apply(effects).await
    }

    /// Decode and apply one inbound frame.
    ///
    /// Undecodable frames are logged and dropped.
    pub async fn handle_inbound(&mut self, raw: &str) -> Result<()> {
        let event = match InboundEvent::decode(raw) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("{:#}", e);
                return Ok(());
            }
        };
        tracing::trace!("Inbound {}", event.name());

        let effects = self.reconciler.handle(event);
        self.apply(effects).await
    }

    /// Execute one user command.
    pub async fn execute(&mut self, command: ControllerCommand) -> Result<()> {
        match command {
            ControllerCommand::Send(content) => self.send_message(&content).await.map(|_| ()),
            ControllerCommand::Stop => self.stop_generation().await,
            ControllerCommand::NewChat(chat_type) => self.create_chat(chat_type).await.map(|_| ()),
            ControllerCommand::Open(chat_id) => self.load_chat(chat_id).await,
            ControllerCommand::Rename { chat_id, title } => self.rename_chat(chat_id, &title).await,
            ControllerCommand::Delete(chat_id) => self.delete_chat(chat_id).await,
            ControllerCommand::SetType(chat_type) => {
                self.set_chat_type(chat_type);
                Ok(())
            }
        }
    }

    /// Run the event loop.
    ///
    /// Returns when `cancel` fires, the command channel closes, or the
    /// inbound stream ends. Failed commands are logged and the loop keeps
    /// going.
    pub async fn run(
        &mut self,
        mut commands: mpsc::Receiver<ControllerCommand>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let transport = Arc::clone(&self.transport);
        let mut inbound = transport.receive();

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::debug!("Controller loop cancelled");
                    break;
                }

                maybe_frame = inbound.next() => {
                    let Some(frame) = maybe_frame else {
                        tracing::warn!("Inbound event stream ended");
                        break;
                    };
                    if let Err(e) = self.handle_inbound(&frame).await {
                        tracing::error!("Failed to apply inbound event: {:#}", e);
                    }
                }

                maybe_command = commands.recv() => {
                    let Some(command) = maybe_command else {
                        tracing::debug!("Command channel closed");
                        break;
                    };
                    if let Err(e) = self.execute(command).await {
                        tracing::error!("Command failed: {:#}", e);
                    }
                }
            }
        }

        Ok(())
    }
}
