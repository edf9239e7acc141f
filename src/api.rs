//! REST client for chat lifecycle operations
//!
//! Chats are created, listed, renamed and deleted over plain HTTP; only the
//! message stream itself travels over the realtime transport.
//!
//! Error responses carry a JSON body of the form `{"error": "..."}`. A 404
//! maps to [`ChatwireError::NotFound`], any other non-success status to
//! [`ChatwireError::Api`].
//!
//! Chat ids are percent-encoded as a single path segment, so an id can never
//! address another resource.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::Config;
use crate::error::{ChatwireError, Result};
use crate::protocol::{ChatId, ChatMessage, ChatSummary, ChatType};

#[derive(Debug, Serialize)]
struct CreateChatRequest {
    #[serde(rename = "type")]
    chat_type: ChatType,
}

#[derive(Debug, Serialize)]
struct RenameChatRequest<'a> {
    title: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for the chat REST endpoints.
#[derive(Debug, Clone)]
pub struct ChatApi {
    client: Client,
    base_url: Url,
}

impl ChatApi {
    /// Build a client from the server configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChatwireError::Config`] if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_base_url(&config.server.base_url, config.request_timeout())
    }

    /// Build a client for an explicit base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ChatwireError::Config`] if `base_url` is not an absolute
    /// http(s) URL or the HTTP client cannot be built.
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ChatwireError::Config(format!("Invalid base URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ChatwireError::Config(format!("Invalid base URL {}", base_url)).into());
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("chatwire/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChatwireError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Append `segments` to the base URL, encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ChatwireError::Config(format!("Invalid base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// URL of a resource under `/api/chats/{id}`.
    ///
    /// Dot segments would be dropped by URL normalization and address the
    /// collection instead, so such ids are reported as not found.
    fn chat_url(&self, chat_id: &ChatId, rest: &[&str]) -> Result<Url> {
        let id = chat_id.as_str();
        if id.is_empty() || id == "." || id == ".." {
            return Err(ChatwireError::NotFound(id.to_string()).into());
        }
        let mut segments = vec!["api", "chats", id];
        segments.extend_from_slice(rest);
        self.url(&segments)
    }

    /// `POST /api/chats`
    pub async fn create_chat(&self, chat_type: ChatType) -> Result<ChatSummary> {
        let url = self.url(&["api", "chats"])?;
        tracing::debug!("Creating {} chat via {}", chat_type, url);

        let response = self
            .client
            .post(url)
            .json(&CreateChatRequest { chat_type })
            .send()
            .await
            .map_err(ChatwireError::from)?;
        let response = check_status(response, None).await?;

        let mut summary: ChatSummary = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse created chat: {}", e);
            ChatwireError::from(e)
        })?;
        // The server does not always echo the type back.
        summary.chat_type.get_or_insert(chat_type);
        Ok(summary)
    }

    /// `GET /api/chats/{id}/messages`
    pub async fn list_messages(&self, chat_id: &ChatId) -> Result<Vec<ChatMessage>> {
        let url = self.chat_url(chat_id, &["messages"])?;
        tracing::debug!("Fetching history from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ChatwireError::from)?;
        let response = check_status(response, Some(chat_id)).await?;

        let body = response.text().await.map_err(ChatwireError::from)?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse history for chat {}: {}", chat_id, e);
            ChatwireError::from(e).into()
        })
    }

    /// `POST /api/chats/{id}/rename`
    pub async fn rename_chat(&self, chat_id: &ChatId, title: &str) -> Result<()> {
        let url = self.chat_url(chat_id, &["rename"])?;
        let response = self
            .client
            .post(url)
            .json(&RenameChatRequest { title })
            .send()
            .await
            .map_err(ChatwireError::from)?;
        check_status(response, Some(chat_id)).await?;
        Ok(())
    }

    /// `DELETE /api/chats/{id}`
    pub async fn delete_chat(&self, chat_id: &ChatId) -> Result<()> {
        let url = self.chat_url(chat_id, &[])?;
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(ChatwireError::from)?;
        check_status(response, Some(chat_id)).await?;
        Ok(())
    }
}

async fn check_status(response: Response, chat_id: Option<&ChatId>) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    tracing::error!("Chat server returned error {}: {}", status, message);

    match (status, chat_id) {
        (StatusCode::NOT_FOUND, Some(id)) => Err(ChatwireError::NotFound(id.to_string()).into()),
        _ => Err(ChatwireError::Api {
            status: status.as_u16(),
            message,
        }
        .into()),
    }
}
