//! HTTP + Server-Sent Events transport
//!
//! [`SseTransport`] posts every outbound event frame to the events endpoint
//! (`base_url + events_path`) and reads inbound frames from a long-lived
//! `GET` on the same endpoint with `Accept: text/event-stream`.
//!
//! # Stream resumption
//!
//! When the event stream closes it is reopened after a short delay. Each
//! SSE `id:` field is remembered and sent back as `Last-Event-ID` on the
//! new request, so a server that supports resumption can replay what was
//! missed.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use tokio::sync::{mpsc, Mutex, RwLock};
use url::Url;

use crate::error::{ChatwireError, Result};
use crate::transport::Transport;

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Realtime transport over HTTP POST (outbound) and SSE (inbound).
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use url::Url;
/// use chatwire::transport::SseTransport;
///
/// let transport = SseTransport::new(
///     Url::parse("http://localhost:5000/events").unwrap(),
///     Duration::from_secs(30),
/// )
/// .unwrap();
/// ```
#[derive(Debug)]
pub struct SseTransport {
    /// Client for POSTs, bounded by the request timeout
    http_client: reqwest::Client,
    /// Client for the event stream; only the connect phase is bounded
    stream_client: reqwest::Client,
    endpoint: Url,
    inbound_tx: mpsc::UnboundedSender<String>,
    inbound_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    /// Last SSE event id, sent as `Last-Event-ID` when the stream reopens
    last_event_id: Arc<RwLock<Option<String>>>,
    reconnect_delay: Duration,
}

impl SseTransport {
    /// Construct a transport for `endpoint`. No network I/O happens here.
    ///
    /// # Errors
    ///
    /// Returns [`ChatwireError::Transport`] if the HTTP client cannot be
    /// built (TLS backend initialisation failure).
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatwireError::Transport(format!("failed to build HTTP client: {}", e)))?;
        let stream_client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ChatwireError::Transport(format!("failed to build HTTP client: {}", e)))?;

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        Ok(Self {
            http_client,
            stream_client,
            endpoint,
            inbound_tx,
            inbound_rx: Arc::new(Mutex::new(inbound_rx)),
            last_event_id: Arc::new(RwLock::new(None)),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        })
    }

    /// Events endpoint this transport talks to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Delay before reopening the event stream after it closes.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Open the inbound event stream.
    ///
    /// Issues the SSE `GET` and spawns a task that parses the body and feeds
    /// [`Transport::receive`]. Returns as soon as the response headers
    /// arrive. When the stream later closes, the task reopens it after the
    /// reconnect delay, sending `Last-Event-ID`, until the transport is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ChatwireError::Transport`] if the first request fails or
    /// the server answers with a non-success status.
    pub async fn open_stream(&self) -> Result<()> {
        let response =
            connect(&self.stream_client, &self.endpoint, &self.last_event_id).await?;
        tracing::info!("Event stream open at {}", self.endpoint);

        let client = self.stream_client.clone();
        let endpoint = self.endpoint.clone();
        let inbound_tx = self.inbound_tx.clone();
        let last_event_id = Arc::clone(&self.last_event_id);
        let delay = self.reconnect_delay;

        tokio::spawn(async move {
            let mut response = response;
            loop {
                parse_sse_stream(
                    response.bytes_stream(),
                    inbound_tx.clone(),
                    Arc::clone(&last_event_id),
                )
                .await;
                tracing::warn!("Event stream closed");

                response = loop {
                    tokio::time::sleep(delay).await;
                    if inbound_tx.is_closed() {
                        tracing::debug!("Transport dropped; not reconnecting");
                        return;
                    }
                    match connect(&client, &endpoint, &last_event_id).await {
                        Ok(response) => break response,
                        Err(e) => tracing::warn!("Reconnect failed: {:#}", e),
                    }
                };
                tracing::info!("Event stream reopened at {}", endpoint);
            }
        });

        Ok(())
    }

    /// Last SSE event id seen on the stream.
    pub async fn last_event_id(&self) -> Option<String> {
        self.last_event_id.read().await.clone()
    }
}

/// Issue the SSE `GET`, resuming from the last seen event id.
async fn connect(
    client: &reqwest::Client,
    endpoint: &Url,
    last_event_id: &RwLock<Option<String>>,
) -> Result<reqwest::Response> {
    let mut req = client
        .get(endpoint.as_str())
        .header("Accept", "text/event-stream");

    {
        let lei = last_event_id.read().await;
        if let Some(ref id) = *lei {
            req = req.header("Last-Event-ID", id.as_str());
        }
    }

    let response = req.send().await.map_err(|e| {
        anyhow::anyhow!(ChatwireError::Transport(format!(
            "event stream request failed: {}",
            e
        )))
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow::anyhow!(ChatwireError::Transport(format!(
            "event stream returned HTTP {}",
            status
        ))));
    }
    Ok(response)
}

#[async_trait::async_trait]
impl Transport for SseTransport {
    /// POST the frame as `application/json`.
    ///
    /// Any 2xx status counts as delivered; response bodies are ignored
    /// because replies arrive on the event stream.
    async fn send(&self, frame: String) -> Result<()> {
        let response = self
            .http_client
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .body(frame)
            .send()
            .await
            .map_err(|e| {
                anyhow::anyhow!(ChatwireError::Transport(format!(
                    "event POST failed: {}",
                    e
                )))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!(ChatwireError::Transport(format!(
                "event POST returned status {}",
                status
            ))));
        }
        Ok(())
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

// ---------------------------------------------------------------------------
// SSE parser
// ---------------------------------------------------------------------------

/// Parse an SSE byte stream and forward each event's `data:` payload.
///
/// Runs until the byte stream ends or errors. Field handling:
///
/// - `id:` -- stored in `last_event_id`.
/// - `event: ping` or `data: [PING]` (case-insensitive) -- keepalive,
///   dropped.
/// - `data:` -- lines of one event are joined with `\n` and forwarded.
/// - `retry:`, comments (`:`) and unknown fields are ignored.
///
/// Bytes are buffered until an event boundary, so multi-byte characters
/// split across network chunks decode correctly. Lines may end in `\n`,
/// `\r\n` or a bare `\r`; each is normalized to `\n`, even when a `\r\n`
/// pair is split across chunks.
pub async fn parse_sse_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>>,
    inbound_tx: mpsc::UnboundedSender<String>,
    last_event_id: Arc<RwLock<Option<String>>>,
) {
    use futures::StreamExt;

    let mut buffer: Vec<u8> = Vec::new();
    let mut after_cr = false;

    tokio::pin!(byte_stream);

    while let Some(chunk_result) = byte_stream.next().await {
        let chunk = match chunk_result {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Event stream read failed: {}", e);
                break;
            }
        };

        normalize_line_endings(&chunk, &mut buffer, &mut after_cr);

        while let Some(pos) = find_boundary(&buffer) {
            let block: Vec<u8> = buffer.drain(..pos + 2).collect();
            match std::str::from_utf8(&block[..pos]) {
                Ok(text) => process_sse_event(text, &inbound_tx, &last_event_id).await,
                Err(e) => tracing::warn!("Dropping non UTF-8 event: {}", e),
            }
        }
    }

    if !buffer.is_empty() {
        if let Ok(text) = std::str::from_utf8(&buffer) {
            process_sse_event(text, &inbound_tx, &last_event_id).await;
        }
    }
}

/// Append `chunk` to `buffer` with every line ending turned into `\n`.
///
/// `after_cr` carries over whether the previous chunk ended in `\r`, so the
/// `\n` of a split `\r\n` is not counted as a second line ending.
fn normalize_line_endings(chunk: &[u8], buffer: &mut Vec<u8>, after_cr: &mut bool) {
    for &byte in chunk {
        match byte {
            b'\r' => {
                buffer.push(b'\n');
                *after_cr = true;
            }
            b'\n' if *after_cr => *after_cr = false,
            _ => {
                buffer.push(byte);
                *after_cr = false;
            }
        }
    }
}

fn find_boundary(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

async fn process_sse_event(
    event_block: &str,
    inbound_tx: &mpsc::UnboundedSender<String>,
    last_event_id: &Arc<RwLock<Option<String>>>,
) {
    let mut data_lines: Vec<&str> = Vec::new();
    let mut event_type: Option<&str> = None;
    let mut event_id: Option<&str> = None;

    for line in event_block.lines() {
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        } else if let Some(value) = line.strip_prefix("id:") {
            event_id = Some(value.trim());
        } else if let Some(value) = line.strip_prefix("event:") {
            event_type = Some(value.trim());
        }
    }

    if let Some(id) = event_id {
        let mut guard = last_event_id.write().await;
        *guard = Some(id.to_string());
    }

    if event_type.is_some_and(|et| et.eq_ignore_ascii_case("ping")) {
        return;
    }

    let data = data_lines.join("\n");
    if data.trim().is_empty() || data.trim().eq_ignore_ascii_case("[ping]") {
        return;
    }

    tracing::trace!("SSE event: {}", data);
    let _ = inbound_tx.send(data);
}
