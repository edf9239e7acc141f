//! In-process fake transport for unit and integration tests
//!
//! [`FakeTransport::new`] returns a `(FakeTransport, FakeTransportHandle)`
//! pair. The transport goes into the code under test; the test keeps the
//! handle to:
//!
//! - read what the client sent: `handle.outbound_rx.recv().await`, or
//!   [`FakeTransportHandle::sent_events`] to decode everything sent so far
//! - push server events: `handle.inbound_tx.send(frame)`, or
//!   [`FakeTransport::inject`] for a JSON value
//!
//! ```text
//! client send() -----> outbound_tx -----> outbound_rx (handle reads)
//! handle inbound_tx -> inbound_tx  -----> inbound_rx  (client receive())
//! ```
//!
//! # Example
//!
//! ```
//! use chatwire::transport::{FakeTransport, Transport};
//!
//! # tokio_test::block_on(async {
//! let (transport, mut handle) = FakeTransport::new();
//!
//! transport.send(r#"{"event":"join_chat","data":{"chat_id":1}}"#.to_string()).await.unwrap();
//! let sent = handle.outbound_rx.recv().await.unwrap();
//! assert!(sent.contains("join_chat"));
//!
//! handle.inbound_tx.send(r#"{"event":"response_complete","data":{"chat_id":1}}"#.to_string()).unwrap();
//! use futures::StreamExt;
//! let received = transport.receive().next().await.unwrap();
//! assert!(received.contains("response_complete"));
//! # });
//! ```

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::{mpsc, Mutex};

use crate::error::{ChatwireError, Result};
use crate::protocol::OutboundEvent;
use crate::transport::Transport;

/// Channel-backed [`Transport`] for tests.
#[derive(Debug)]
pub struct FakeTransport {
    outbound_tx: mpsc::UnboundedSender<String>,
    inbound_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    /// Same channel as `handle.inbound_tx`, used by `inject`
    inbound_inject_tx: mpsc::UnboundedSender<String>,
}

impl FakeTransport {
    /// Create a connected `(FakeTransport, FakeTransportHandle)` pair.
    pub fn new() -> (Self, FakeTransportHandle) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();

        let transport = Self {
            outbound_tx,
            inbound_rx: Arc::new(Mutex::new(inbound_rx)),
            inbound_inject_tx: inbound_tx.clone(),
        };

        let handle = FakeTransportHandle {
            outbound_rx,
            inbound_tx,
        };

        (transport, handle)
    }

    /// Push a JSON value onto the inbound stream as one frame.
    ///
    /// # Errors
    ///
    /// Returns [`ChatwireError::Transport`] if the inbound channel is closed.
    pub fn inject(&self, frame: serde_json::Value) -> Result<()> {
        self.inbound_inject_tx
            .send(frame.to_string())
            .map_err(|e| ChatwireError::Transport(format!("inbound channel closed: {}", e)).into())
    }
}

/// Test-side end of a [`FakeTransport`].
#[derive(Debug)]
pub struct FakeTransportHandle {
    /// Frames the client sent via [`Transport::send`]
    pub outbound_rx: mpsc::UnboundedReceiver<String>,
    /// Frames pushed here appear on [`Transport::receive`]
    pub inbound_tx: mpsc::UnboundedSender<String>,
}

impl FakeTransportHandle {
    /// Drain and decode every frame sent so far.
    ///
    /// Frames that are not valid outbound events are skipped.
    pub fn sent_events(&mut self) -> Vec<OutboundEvent> {
        let mut events = Vec::new();
        while let Ok(frame) = self.outbound_rx.try_recv() {
            match serde_json::from_str(&frame) {
                Ok(event) => events.push(event),
                Err(e) => tracing::warn!("FakeTransport: undecodable frame {}: {}", frame, e),
            }
        }
        events
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn send(&self, frame: String) -> Result<()> {
        self.outbound_tx.send(frame).map_err(|e| {
            anyhow::anyhow!(ChatwireError::Transport(format!(
                "FakeTransport outbound channel closed: {}",
                e
            )))
        })
    }

    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        let rx = Arc::clone(&self.inbound_rx);
        Box::pin(futures::stream::unfold(rx, |rx| async move {
            let mut guard = rx.lock().await;
            let item = guard.recv().await?;
            drop(guard);
            Some((item, rx))
        }))
    }
}
