//! Error types for the chat session layer.

use farma_core::error::FarmaError;

/// Errors from the completion gateway boundary.
///
/// The orchestrator never lets these escape: every variant becomes the same
/// fixed assistant message. The distinction only matters for logs.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("gateway returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed gateway response: {0}")]
    MalformedResponse(String),
    #[error("gateway reported an error: {0}")]
    Rejected(String),
    #[error("core error: {0}")]
    Core(String),
}

impl From<FarmaError> for ChatError {
    fn from(err: FarmaError) -> Self {
        ChatError::Core(err.to_string())
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChatError::MalformedResponse(err.to_string())
        } else {
            ChatError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::MalformedResponse(err.to_string())
    }
}
