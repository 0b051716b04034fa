//! Completion gateway boundary.
//!
//! The gateway is opaque beyond its request/response shape:
//!
//! ```text
//! POST <url>
//! { "message", "hasImage", "imageData"?, "conversationHistory": [{role, content}] }
//! -> { "response": "..." }
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use farma_core::config::GatewayConfig;
use farma_core::types::HistoryEntry;

use crate::error::ChatError;

/// Longest error body kept in a `ChatError::Status`.
const MAX_ERROR_BODY: usize = 512;

/// Image payload ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub base64_payload: String,
}

/// One outbound turn. Built per send and not retained afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRequest {
    pub user_text: String,
    pub history: Vec<HistoryEntry>,
    pub image: Option<EncodedImage>,
}

impl ConversationRequest {
    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// Borrowing view in the gateway's JSON shape.
    pub fn to_wire(&self) -> GatewayRequest<'_> {
        GatewayRequest {
            message: &self.user_text,
            has_image: self.has_image(),
            image_data: self.image.as_ref().map(|i| i.base64_payload.as_str()),
            conversation_history: &self.history,
        }
    }
}

/// JSON body posted to the gateway.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRequest<'a> {
    pub message: &'a str,
    pub has_image: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data: Option<&'a str>,
    pub conversation_history: &'a [HistoryEntry],
}

/// JSON body returned by the gateway.
#[derive(Debug, Default, Deserialize)]
pub struct GatewayResponse {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl GatewayResponse {
    /// Extract the reply text, treating an error indicator or a missing or
    /// blank `response` as a failure.
    pub fn into_text(self) -> Result<String, ChatError> {
        if let Some(error) = self.error.filter(|e| !e.is_null()) {
            let detail = match error {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            return Err(ChatError::Rejected(detail));
        }
        match self.response {
            Some(text) if !text.trim().is_empty() => Ok(text),
            Some(_) => Err(ChatError::MalformedResponse(
                "empty `response` field".to_string(),
            )),
            None => Err(ChatError::MalformedResponse(
                "missing `response` field".to_string(),
            )),
        }
    }
}

/// A text/vision completion service.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Send one turn and return the assistant's reply text.
    async fn complete(&self, request: &ConversationRequest) -> Result<String, ChatError>;
}

#[async_trait]
impl<G: ChatGateway + ?Sized> ChatGateway for Arc<G> {
    async fn complete(&self, request: &ConversationRequest) -> Result<String, ChatError> {
        (**self).complete(request).await
    }
}

/// Gateway reached over HTTP.
///
/// No client-side deadline is imposed; failures surface only when the
/// transport or the server reports them.
#[derive(Debug, Clone)]
pub struct HttpChatGateway {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpChatGateway {
    pub fn new(config: &GatewayConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: &GatewayConfig) -> Self {
        Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatGateway for HttpChatGateway {
    async fn complete(&self, request: &ConversationRequest) -> Result<String, ChatError> {
        let mut builder = self.client.post(&self.url).json(&request.to_wire());
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key).header("apikey", key);
        }

        debug!(
            url = %self.url,
            has_image = request.has_image(),
            history = request.history.len(),
            "Dispatching gateway request"
        );

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Gateway returned non-success status");
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GatewayResponse = serde_json::from_str(&body)?;
        parsed.into_text()
    }
}

/// Scripted gateway for tests and offline runs.
///
/// Replies are returned in the order they were queued. Every request is
/// recorded. With nothing queued, `complete` fails with a transport error.
#[derive(Debug, Default)]
pub struct MockGateway {
    replies: Mutex<VecDeque<Result<String, ChatError>>>,
    requests: Mutex<Vec<ConversationRequest>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway with one successful reply queued.
    pub fn with_reply(text: &str) -> Self {
        let gateway = Self::new();
        gateway.push_reply(text);
        gateway
    }

    pub fn push_reply(&self, text: &str) {
        self.replies
            .lock()
            .expect("mock gateway mutex poisoned")
            .push_back(Ok(text.to_string()));
    }

    pub fn push_error(&self, error: ChatError) {
        self.replies
            .lock()
            .expect("mock gateway mutex poisoned")
            .push_back(Err(error));
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ConversationRequest> {
        self.requests
            .lock()
            .expect("mock gateway mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl ChatGateway for MockGateway {
    async fn complete(&self, request: &ConversationRequest) -> Result<String, ChatError> {
        self.requests
            .lock()
            .expect("mock gateway mutex poisoned")
            .push(request.clone());
        self.replies
            .lock()
            .expect("mock gateway mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(ChatError::Transport("no scripted reply".to_string())))
    }
}
