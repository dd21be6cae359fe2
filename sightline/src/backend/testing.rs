//! Scripted backend double shared by the core's tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::client::VisionBackend;
use super::wire::{ChatRequest, ChatResponse, StatusResponse, UploadResponse};
use crate::error::{Error, Result};

/// A backend that replays scripted responses and counts calls.
///
/// Exhausted scripts answer with transient errors, so a component that keeps
/// calling past its script shows up in the call counters.
#[derive(Default)]
pub struct MockBackend {
    statuses: Mutex<VecDeque<Result<StatusResponse>>>,
    uploads: Mutex<VecDeque<Result<UploadResponse>>>,
    chats: Mutex<VecDeque<Result<ChatResponse>>>,
    status_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    chat_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_status(&self, step: u32, ready: bool) {
        self.statuses.lock().unwrap().push_back(Ok(StatusResponse {
            message: format!("STEP {step}"),
            detail: format!("stage {step}"),
            step,
            total_steps: 5,
            ready,
        }));
    }

    pub fn push_status_failure(&self) {
        self.statuses
            .lock()
            .unwrap()
            .push_back(Err(Error::StatusUnavailable("connection refused".into())));
    }

    pub fn push_upload(&self, url: &str, file_id: &str) {
        self.uploads.lock().unwrap().push_back(Ok(UploadResponse {
            url: url.to_string(),
            file_id: file_id.to_string(),
        }));
    }

    pub fn push_upload_failure(&self, reason: &str) {
        self.uploads
            .lock()
            .unwrap()
            .push_back(Err(Error::UploadFailed(reason.to_string())));
    }

    pub fn push_chat(&self, reply: &str, grounding: Vec<crate::models::Detection>) {
        self.chats.lock().unwrap().push_back(Ok(ChatResponse {
            reply: Some(reply.to_string()),
            grounding,
        }));
    }

    pub fn push_chat_failure(&self, reason: &str) {
        self.chats
            .lock()
            .unwrap()
            .push_back(Err(Error::ChatFailed(reason.to_string())));
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionBackend for MockBackend {
    async fn upload(&self, _file_name: &str, _bytes: Vec<u8>) -> Result<UploadResponse> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.uploads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::UploadFailed("upload script exhausted".into())))
    }

    async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.chats
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::ChatFailed("chat script exhausted".into())))
    }

    async fn status(&self) -> Result<StatusResponse> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::StatusUnavailable("status script exhausted".into())))
    }

    fn image_url(&self, relative: &str) -> String {
        format!("http://mock-backend{relative}")
    }
}
