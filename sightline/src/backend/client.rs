//! HTTP client for the vision backend.
//!
//! The core only sees the `VisionBackend` capability; tests substitute
//! scripted doubles and never open a socket.

use async_trait::async_trait;
use log::debug;
use reqwest::multipart::{Form, Part};

use super::wire::{ChatRequest, ChatResponse, StatusResponse, UploadResponse};
use crate::error::{Error, Result};

const UPLOAD_PATH: &str = "/api/upload";
const CHAT_PATH: &str = "/api/chat";
const STATUS_PATH: &str = "/api/status";

/// Capability surface of the remote vision service.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Store an image on the backend.
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadResponse>;

    /// Ask one question about a stored image.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Warm-up state of the model pipeline.
    async fn status(&self) -> Result<StatusResponse>;

    /// Absolute URL for a backend-relative file path.
    fn image_url(&self, relative: &str) -> String;
}

/// `VisionBackend` over HTTP.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Client for the backend at `base_url` (trailing slashes ignored).
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl VisionBackend for HttpBackend {
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadResponse> {
        let url = self.endpoint(UPLOAD_PATH);
        debug!("POST {url} ({file_name}, {} bytes)", bytes.len());
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part("file", part);
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| Error::UploadFailed(err.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::UploadFailed(format!(
                "backend returned {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|err| Error::UploadFailed(err.to_string()))
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = self.endpoint(CHAT_PATH);
        debug!("POST {url} (session {})", request.session_id);
        let resp = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|err| Error::ChatFailed(err.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::ChatFailed(format!(
                "backend returned {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|err| Error::ChatFailed(err.to_string()))
    }

    async fn status(&self) -> Result<StatusResponse> {
        let url = self.endpoint(STATUS_PATH);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| Error::StatusUnavailable(err.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::StatusUnavailable(format!(
                "backend returned {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|err| Error::StatusUnavailable(err.to_string()))
    }

    fn image_url(&self, relative: &str) -> String {
        if relative.starts_with('/') {
            format!("{}{relative}", self.base_url)
        } else {
            format!("{}/{relative}", self.base_url)
        }
    }
}
