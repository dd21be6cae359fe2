//! Wire types for the vision backend's HTTP surface.
//!
//! Decoding is tolerant: a cold or partially warmed backend omits fields, so
//! everything optional defaults instead of failing the whole response.

use serde::{Deserialize, Serialize};

use crate::models::Detection;

/// Response from `POST /api/upload`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    /// Path of the stored file, relative to the backend root.
    pub url: String,
    /// Opaque identifier for the stored file.
    pub file_id: String,
}

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// The user's question.
    pub text: String,
    /// Absolute URL of the uploaded image.
    pub image_url: String,
    /// Session the question belongs to.
    pub session_id: String,
}

/// Reply text used when the backend returns none.
pub const EMPTY_REPLY_FALLBACK: &str = "No response text generated.";

/// Response from `POST /api/chat`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    /// Natural-language answer; absent when generation produced nothing.
    #[serde(default)]
    pub reply: Option<String>,
    /// Detections justifying the reply, in backend order.
    #[serde(default)]
    pub grounding: Vec<Detection>,
}

impl ChatResponse {
    /// Reply text with the empty-reply fallback applied.
    pub fn reply_text(&self) -> &str {
        self.reply
            .as_deref()
            .filter(|text| !text.is_empty())
            .unwrap_or(EMPTY_REPLY_FALLBACK)
    }
}

/// Response from `GET /api/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    /// Phase label, e.g. "LOADING VISION CORE".
    #[serde(default)]
    pub message: String,
    /// Scrolling-log detail line.
    #[serde(default)]
    pub detail: String,
    /// Pipeline stage index.
    #[serde(default)]
    pub step: u32,
    /// Pipeline stage count; older backends omit it.
    #[serde(default = "default_total_steps")]
    pub total_steps: u32,
    /// Sole termination signal for a warm-up cycle.
    #[serde(default)]
    pub ready: bool,
}

const fn default_total_steps() -> u32 {
    5
}
