//! Chatwire - streaming chat client library
//!
//! This library keeps a live chat view consistent while assistant replies
//! stream in over a realtime connection: chunks arrive out of band,
//! completions can be stale, the user can switch chats or stop a reply
//! mid-stream, and history reloads must merge with whatever is streaming.
//!
//! # Architecture
//!
//! - `protocol`: Wire envelope, event payloads and identifiers
//! - `reconciler`: Pure stream reconciliation state machine producing effects
//! - `controller`: Applies effects to a transport and a view; event loop
//! - `transport`: Realtime transport trait, SSE and in-memory implementations
//! - `api`: REST client for chat lifecycle operations
//! - `store`: Last active chat persistence
//! - `view`: Terminal rendering of effects
//! - `config`, `cli`, `commands`, `error`: application plumbing
//!
//! # Example
//!
//! ```
//! use chatwire::protocol::{ChatId, ChatType, InboundEvent};
//! use chatwire::StreamReconciler;
//!
//! let mut reconciler = StreamReconciler::new();
//! reconciler.on_chat_switch(ChatId::new("1"));
//! reconciler.on_send(Some(&ChatId::new("1")), "hello", ChatType::General);
//!
//! let chunk = InboundEvent::decode(
//!     r#"{"event":"response_chunk","data":{"chat_id":1,"message_id":7,"chunk":"Hi"}}"#,
//! )
//! .unwrap();
//! reconciler.handle(chunk);
//! assert_eq!(reconciler.live_message().unwrap().text(), "Hi");
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod protocol;
pub mod reconciler;
pub mod store;
pub mod transport;
pub mod view;

// Re-export commonly used types
pub use config::Config;
pub use controller::{ChatController, ChatView, ControllerCommand};
pub use error::{ChatwireError, Result};
pub use reconciler::{Effect, StreamReconciler};
