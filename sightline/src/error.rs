//! Crate-wide error taxonomy.
//!
//! Every kind here is recoverable: the orchestrator converts user-facing
//! failures into transcript entries and the rest into `Result`s the caller
//! branches on. Nothing propagates as an uncaught fault into the
//! presentation layer.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong in the core.
#[derive(Debug, Error)]
pub enum Error {
    /// Store lookup missed.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Rename validation: title empty after trimming.
    #[error("session title cannot be empty")]
    EmptyTitle,

    /// At least one session must always exist.
    #[error("cannot delete the last remaining session")]
    LastSession,

    /// Query or upload confirmation without an uploaded image.
    #[error("no uploaded image for this session")]
    ImageMissing,

    /// The chosen file is missing or does not decode as an image.
    #[error("cannot read image {}: {reason}", path.display())]
    InvalidImage {
        /// Path the user supplied.
        path: PathBuf,
        /// Decoder or filesystem complaint.
        reason: String,
    },

    /// Upload rejected by the backend or failed in transit.
    #[error("image upload failed: {0}")]
    UploadFailed(String),

    /// Chat request rejected by the backend or failed in transit.
    #[error("chat request failed: {0}")]
    ChatFailed(String),

    /// Warm-up status query failed; swallowed and retried by the poller.
    #[error("backend status unavailable: {0}")]
    StatusUnavailable(String),
}
