//! Realtime transport abstraction and implementations
//!
//! The [`Transport`] trait carries raw event frames between the client and
//! the chat server. Frames are the JSON envelopes described in
//! [`crate::protocol`]; encoding and decoding happen in the controller, so
//! transports only move strings.
//!
//! - [`sse::SseTransport`] -- outbound frames are HTTP POSTs, inbound
//!   frames arrive on a long-lived Server-Sent Events stream.
//! - [`fake::FakeTransport`] -- in-process channel pair used by tests.
//!
//! Delivery is in order per connection. Nothing is retried: a failed send
//! is reported to the caller and the action simply does not complete.

use std::pin::Pin;

use futures::Stream;

use crate::error::Result;

/// Abstraction over realtime event transports.
///
/// Used polymorphically through `Arc<dyn Transport>` by
/// [`crate::controller::ChatController`].
#[async_trait::async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Send one complete event frame to the server.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ChatwireError::Transport`] if the frame could
    /// not be delivered.
    async fn send(&self, frame: String) -> Result<()>;

    /// Stream of inbound event frames, one complete JSON envelope per item.
    ///
    /// The stream ends when the transport is closed.
    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>>;
}

pub mod fake;
pub mod sse;

pub use fake::{FakeTransport, FakeTransportHandle};
pub use sse::SseTransport;
