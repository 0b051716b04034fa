use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    User,
    Assistant,
}

impl Origin {
    /// Role name used on the gateway wire format.
    pub fn role(&self) -> &'static str {
        match self {
            Origin::User => "user",
            Origin::Assistant => "assistant",
        }
    }
}

/// Camera facing direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    /// Selfie camera.
    Front,
    /// Environment camera.
    #[default]
    Back,
}

impl Facing {
    pub fn opposite(&self) -> Facing {
        match self {
            Facing::Front => Facing::Back,
            Facing::Back => Facing::Front,
        }
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Facing::Front => write!(f, "front"),
            Facing::Back => write!(f, "back"),
        }
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Session-scoped message identifier, issued in append order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Image data displayed alongside a sent user message.
///
/// Cheap to clone; the bytes are shared, never copied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageRef {
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

impl ImageRef {
    pub fn new(mime_type: impl Into<String>, bytes: Arc<[u8]>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One entry of the conversation history.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub origin: Origin,
    pub created_at: DateTime<Utc>,
    pub attached_image: Option<ImageRef>,
}

impl Message {
    pub fn is_user(&self) -> bool {
        self.origin == Origin::User
    }

    /// Project the message into the gateway's role/content shape.
    pub fn to_history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            role: self.origin.role().to_string(),
            content: self.text.clone(),
        }
    }
}

/// A `{role, content}` pair as sent in `conversationHistory`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}
