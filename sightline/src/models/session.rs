//! Session model representing one conversation thread.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Detection, Message, MessageRole};

/// Title given to sessions before their first successful upload.
pub const DEFAULT_TITLE: &str = "New Session";

/// Backend-assigned identity of an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteImage {
    /// Absolute URL the chat endpoint reads the image from.
    pub url: String,
    /// Opaque backend identifier for the stored file.
    pub file_id: String,
}

/// Upload lifecycle of a session's image.
///
/// The backend reference only exists in `Uploaded`, so a URL without a file
/// id (or the reverse) is unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "state")]
pub enum ImageState {
    /// No image chosen.
    #[default]
    Empty,
    /// Local preview recorded; upload not yet confirmed.
    Pending {
        /// Client-visible preview handle.
        preview: PathBuf,
    },
    /// Upload confirmed by the backend.
    Uploaded {
        /// Client-visible preview handle.
        preview: PathBuf,
        /// Backend image reference.
        remote: RemoteImage,
    },
}

impl ImageState {
    /// Backend image reference, if the upload has been confirmed.
    pub const fn remote(&self) -> Option<&RemoteImage> {
        match self {
            Self::Uploaded { remote, .. } => Some(remote),
            _ => None,
        }
    }

    /// Local preview handle, if an image was chosen.
    pub fn preview(&self) -> Option<&Path> {
        match self {
            Self::Pending { preview } | Self::Uploaded { preview, .. } => Some(preview),
            Self::Empty => None,
        }
    }

    /// Whether no image is attached.
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// A session: one independent conversation with its own image and transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier (time-ordered UUID).
    pub id: String,
    /// Display title; starts as `DEFAULT_TITLE`.
    pub title: String,
    /// Upload lifecycle of the attached image.
    pub image: ImageState,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Transcript in conversation order; append-only.
    messages: Vec<Message>,
    /// Next transcript position to hand out.
    next_message_id: u64,
}

impl Session {
    /// Create a new session with an empty transcript.
    pub fn new() -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            title: DEFAULT_TITLE.to_string(),
            image: ImageState::Empty,
            created_at: Utc::now(),
            messages: Vec::new(),
            next_message_id: 0,
        }
    }

    /// The transcript, in conversation order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Append a message, assigning the next transcript position.
    pub fn push_message(
        &mut self,
        role: MessageRole,
        text: String,
        grounding: Vec<Detection>,
    ) -> u64 {
        let id = self.next_message_id;
        self.next_message_id += 1;
        self.messages.push(Message::new(id, role, text, grounding));
        id
    }

    /// Detections of the most recent message carrying a grounding payload.
    ///
    /// This is what the overlay draws: older payloads are superseded.
    pub fn latest_grounding(&self) -> &[Detection] {
        self.messages
            .iter()
            .rev()
            .find(|m| !m.grounding.is_empty())
            .map_or(&[], |m| m.grounding.as_slice())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
