//! Message model representing one transcript entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Detection;

/// Role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from the assistant (backend replies, announcements, errors).
    Assistant,
}

impl MessageRole {
    /// Convert role to its display string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A message in a session transcript.
///
/// Messages are immutable once appended; transcripts never reorder or delete
/// individual entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Transcript position, assigned by the owning session in append order.
    pub id: u64,
    /// Role of the message sender.
    pub role: MessageRole,
    /// Body text.
    pub text: String,
    /// When the message was created.
    pub created_at: DateTime<Utc>,
    /// Detections justifying the answer; empty for most messages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grounding: Vec<Detection>,
}

impl Message {
    /// Create a new message (id is assigned by the owning session).
    pub(crate) fn new(id: u64, role: MessageRole, text: String, grounding: Vec<Detection>) -> Self {
        Self {
            id,
            role,
            text,
            created_at: Utc::now(),
            grounding,
        }
    }

    /// Clock-face timestamp shown next to the message.
    pub fn display_time(&self) -> String {
        self.created_at.format("%H:%M").to_string()
    }
}
