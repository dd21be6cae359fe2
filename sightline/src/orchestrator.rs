//! Conversation sequencing: uploads, readiness gating, chat cycles.
//!
//! The orchestrator is the single mutator of the session store. The
//! presentation layer forwards user intents here and awaits each entry point
//! to completion, which is also what keeps chat requests at one-in-flight:
//! preventing a second submission while one is outstanding is the caller's
//! contract (the UI disables its input), not an internal lock.

use std::path::Path;
use std::sync::Arc;

use log::{debug, info};
use tokio::sync::watch;

use crate::backend::{ChatRequest, VisionBackend};
use crate::error::{Error, Result};
use crate::models::{MessageRole, RemoteImage, DEFAULT_TITLE};
use crate::readiness::{ReadinessPoller, ReadinessState};
use crate::store::SessionStore;

/// Transcript entry appended when a query arrives before any upload.
pub const UPLOAD_FIRST_PROMPT: &str = "Please upload a satellite image first.";

/// Outcome of a submission, for the presentation layer to branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Input was empty; nothing happened.
    Ignored,
    /// Rejected before any network call; the explanation is in the transcript.
    Rejected,
    /// The request ran and the transcript was updated.
    Completed,
    /// The target session disappeared while the request was in flight; the
    /// response was discarded.
    Discarded,
}

/// Where a session sits in its upload/readiness lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    /// No image attached.
    NoImage,
    /// Upload submitted, backend confirmation pending.
    Uploading,
    /// Upload confirmed, model pipeline still warming.
    Warming,
    /// Upload confirmed and the pipeline reported ready.
    Ready,
}

/// Sequences upload submission, readiness gating, and chat cycles.
pub struct Orchestrator {
    store: SessionStore,
    backend: Arc<dyn VisionBackend>,
    poller: ReadinessPoller,
    analyzing: bool,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn VisionBackend>) -> Self {
        Self {
            store: SessionStore::new(),
            backend,
            poller: ReadinessPoller::new(),
            analyzing: false,
        }
    }

    /// Read access to the session store.
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Session management intents (create, rename, delete, switch) pass
    /// through to the store; they involve no network traffic.
    pub fn store_mut(&mut self) -> &mut SessionStore {
        &mut self.store
    }

    /// Whether a chat request is in flight.
    pub const fn analyzing(&self) -> bool {
        self.analyzing
    }

    /// Observe warm-up progress for the active upload cycle.
    pub fn readiness(&self) -> watch::Receiver<ReadinessState> {
        self.poller.subscribe()
    }

    /// Upload `path` for `session_id` and start a fresh warm-up cycle.
    ///
    /// The warm-up cycle is deliberately not tied to upload completion: the
    /// upload can finish before the model pipeline is warm, and the caller
    /// keeps showing progress until the poller reports ready.
    pub async fn submit_upload(&mut self, session_id: &str, path: &Path) -> Result<Submission> {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
            return Ok(Submission::Ignored);
        };
        image::image_dimensions(path).map_err(|err| Error::InvalidImage {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        let bytes = tokio::fs::read(path).await.map_err(|err| Error::InvalidImage {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

        // Optimistic preview, independent of the network outcome.
        self.store.set_preview(session_id, path)?;
        self.poller.start(Arc::clone(&self.backend)).await;
        info!("uploading {file_name} for session {session_id}");

        let outcome = self.backend.upload(&file_name, bytes).await;
        self.apply_upload_outcome(session_id, &file_name, outcome).await
    }

    /// Reconcile an upload result with whatever the store looks like once
    /// the response arrives. A result for a deleted session is discarded.
    async fn apply_upload_outcome(
        &mut self,
        session_id: &str,
        file_name: &str,
        outcome: Result<crate::backend::UploadResponse>,
    ) -> Result<Submission> {
        match outcome {
            Ok(response) => {
                if self.store.get(session_id).is_err() {
                    // Session went away mid-flight; drop the result and the
                    // now-ownerless warm-up display.
                    self.poller.stop().await;
                    return Ok(Submission::Discarded);
                }
                let remote = RemoteImage {
                    url: self.backend.image_url(&response.url),
                    file_id: response.file_id,
                };
                info!("upload confirmed: {} (file_id {})", remote.url, remote.file_id);
                self.store.attach_remote(session_id, remote)?;
                if self.store.get(session_id)?.title == DEFAULT_TITLE {
                    self.store.rename(session_id, file_name)?;
                }
                self.store.append_message(
                    session_id,
                    MessageRole::Assistant,
                    format!("Image \"{file_name}\" uploaded. System Online & Ready."),
                    Vec::new(),
                )?;
                Ok(Submission::Completed)
            }
            Err(err) => {
                // Roll back the optimistic preview and kill the stale
                // warm-up display.
                self.poller.stop().await;
                if self.store.get(session_id).is_ok() {
                    self.store.clear_image(session_id)?;
                }
                Err(err)
            }
        }
    }

    /// Ask one question against the session's uploaded image.
    pub async fn submit_query(&mut self, session_id: &str, text: &str) -> Result<Submission> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Submission::Ignored);
        }

        // Optimistic user entry; it stays even if the request fails.
        self.store
            .append_message(session_id, MessageRole::User, text.to_string(), Vec::new())?;

        let Some(remote) = self.store.get(session_id)?.image.remote().cloned() else {
            self.store.append_message(
                session_id,
                MessageRole::Assistant,
                UPLOAD_FIRST_PROMPT.to_string(),
                Vec::new(),
            )?;
            return Ok(Submission::Rejected);
        };

        let request = ChatRequest {
            text: text.to_string(),
            image_url: remote.url,
            session_id: session_id.to_string(),
        };
        self.analyzing = true;
        debug!("chat request for session {session_id}");
        let outcome = self.backend.chat(&request).await;
        self.analyzing = false;
        self.apply_chat_outcome(session_id, outcome)
    }

    /// Reconcile a chat result with the store state at response arrival.
    /// The response goes to the session captured at request initiation; if
    /// that session was deleted mid-flight the result is discarded.
    fn apply_chat_outcome(
        &mut self,
        session_id: &str,
        outcome: Result<crate::backend::ChatResponse>,
    ) -> Result<Submission> {
        if self.store.get(session_id).is_err() {
            debug!("dropping chat response for deleted session {session_id}");
            return Ok(Submission::Discarded);
        }
        match outcome {
            Ok(response) => {
                let reply = response.reply_text().to_string();
                self.store.append_message(
                    session_id,
                    MessageRole::Assistant,
                    reply,
                    response.grounding,
                )?;
            }
            Err(err) => {
                // Surfaced in the transcript; no automatic retry.
                self.store.append_message(
                    session_id,
                    MessageRole::Assistant,
                    format!("Error: {err}."),
                    Vec::new(),
                )?;
            }
        }
        Ok(Submission::Completed)
    }

    /// Drop the session's image; preview and backend reference go together.
    /// The session returns to the start of its upload lifecycle.
    pub fn remove_image(&mut self, session_id: &str) -> Result<()> {
        self.store.clear_image(session_id)
    }

    /// Where the session currently sits in its upload lifecycle.
    pub fn upload_phase(&self, session_id: &str) -> Result<UploadPhase> {
        use crate::models::ImageState;
        let session = self.store.get(session_id)?;
        Ok(match &session.image {
            ImageState::Empty => UploadPhase::NoImage,
            ImageState::Pending { .. } => UploadPhase::Uploading,
            ImageState::Uploaded { .. } => {
                if self.poller.is_active() && !self.poller.current().ready {
                    UploadPhase::Warming
                } else {
                    UploadPhase::Ready
                }
            }
        })
    }

    /// Cancel background work before shutdown.
    pub async fn shutdown(&mut self) {
        self.poller.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::MockBackend;
    use crate::models::{Detection, OrientedBox};
    use std::io::Write as _;
    use std::path::PathBuf;

    /// A tiny valid PNG on disk, so upload validation has a real file.
    fn sample_image(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        let image = image::RgbImage::new(4, 4);
        image.save(&path).unwrap();
        path
    }

    fn grounded(label: &str) -> Detection {
        Detection {
            bbox: OrientedBox::from([100.0, 100.0, 40.0, 20.0, 0.0]),
            score: 0.8,
            label: label.to_string(),
        }
    }

    fn orchestrator_with(backend: &Arc<MockBackend>) -> Orchestrator {
        Orchestrator::new(Arc::clone(backend) as Arc<dyn VisionBackend>)
    }

    #[tokio::test(start_paused = true)]
    async fn query_without_image_never_hits_the_network() {
        let backend = Arc::new(MockBackend::new());
        let mut orchestrator = orchestrator_with(&backend);
        let id = orchestrator.store().active_id().to_string();

        let outcome = orchestrator.submit_query(&id, "what do you see?").await.unwrap();

        assert_eq!(outcome, Submission::Rejected);
        assert_eq!(backend.chat_calls(), 0);
        let messages = orchestrator.store().get(&id).unwrap().messages();
        // Welcome, user query, assistant rejection.
        assert_eq!(messages.len(), 3);
        let last = messages.last().unwrap();
        assert_eq!(last.role, MessageRole::Assistant);
        assert!(last.text.to_lowercase().contains("upload"));
        assert!(!orchestrator.analyzing());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_query_is_a_no_op() {
        let backend = Arc::new(MockBackend::new());
        let mut orchestrator = orchestrator_with(&backend);
        let id = orchestrator.store().active_id().to_string();

        let outcome = orchestrator.submit_query(&id, "   \n").await.unwrap();

        assert_eq!(outcome, Submission::Ignored);
        assert_eq!(orchestrator.store().get(&id).unwrap().messages().len(), 1);
        assert_eq!(backend.chat_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_upload_attaches_remote_and_renames_default_title() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_image(&dir, "harbor.png");
        let backend = Arc::new(MockBackend::new());
        backend.push_upload("/files/harbor.png", "img-1");
        backend.push_status(5, true);

        let mut orchestrator = orchestrator_with(&backend);
        let id = orchestrator.store().active_id().to_string();

        let outcome = orchestrator.submit_upload(&id, &path).await.unwrap();

        assert_eq!(outcome, Submission::Completed);
        let session = orchestrator.store().get(&id).unwrap();
        assert_eq!(session.title, "harbor.png");
        let remote = session.image.remote().unwrap();
        assert_eq!(remote.url, "http://mock-backend/files/harbor.png");
        assert_eq!(remote.file_id, "img-1");
        let last = session.messages().last().unwrap();
        assert!(last.text.contains("harbor.png"));
        assert!(last.text.contains("uploaded"));
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn upload_does_not_rename_custom_titles() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_image(&dir, "runway.png");
        let backend = Arc::new(MockBackend::new());
        backend.push_upload("/files/runway.png", "img-2");
        backend.push_status(5, true);

        let mut orchestrator = orchestrator_with(&backend);
        let id = orchestrator.store().active_id().to_string();
        orchestrator.store_mut().rename(&id, "Airfield study").unwrap();

        orchestrator.submit_upload(&id, &path).await.unwrap();

        assert_eq!(orchestrator.store().get(&id).unwrap().title, "Airfield study");
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_upload_rolls_back_preview_and_cancels_readiness() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_image(&dir, "scene.png");
        let backend = Arc::new(MockBackend::new());
        backend.push_upload_failure("gateway timeout");

        let mut orchestrator = orchestrator_with(&backend);
        let id = orchestrator.store().active_id().to_string();

        let err = orchestrator.submit_upload(&id, &path).await.unwrap_err();

        assert!(matches!(err, Error::UploadFailed(_)));
        let session = orchestrator.store().get(&id).unwrap();
        assert!(session.image.is_empty());
        assert_eq!(session.title, DEFAULT_TITLE);
        assert_eq!(
            orchestrator.upload_phase(&id).unwrap(),
            UploadPhase::NoImage
        );
    }

    #[tokio::test(start_paused = true)]
    async fn missing_file_is_rejected_before_any_state_change() {
        let backend = Arc::new(MockBackend::new());
        let mut orchestrator = orchestrator_with(&backend);
        let id = orchestrator.store().active_id().to_string();

        let err = orchestrator
            .submit_upload(&id, Path::new("/nonexistent/scene.png"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidImage { .. }));
        assert!(orchestrator.store().get(&id).unwrap().image.is_empty());
        assert_eq!(backend.upload_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_query_appends_reply_with_grounding() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_image(&dir, "port.png");
        let backend = Arc::new(MockBackend::new());
        backend.push_upload("/files/port.png", "img-3");
        backend.push_status(5, true);
        backend.push_chat("Two cars near the pier.", vec![grounded("car"), grounded("car")]);

        let mut orchestrator = orchestrator_with(&backend);
        let id = orchestrator.store().active_id().to_string();
        orchestrator.submit_upload(&id, &path).await.unwrap();

        let outcome = orchestrator.submit_query(&id, "find cars").await.unwrap();

        assert_eq!(outcome, Submission::Completed);
        assert_eq!(backend.chat_calls(), 1);
        let session = orchestrator.store().get(&id).unwrap();
        let last = session.messages().last().unwrap();
        assert_eq!(last.role, MessageRole::Assistant);
        assert_eq!(last.text, "Two cars near the pier.");
        assert_eq!(last.grounding.len(), 2);
        assert_eq!(session.latest_grounding().len(), 2);
        assert!(!orchestrator.analyzing());
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_query_surfaces_error_in_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_image(&dir, "bay.png");
        let backend = Arc::new(MockBackend::new());
        backend.push_upload("/files/bay.png", "img-4");
        backend.push_status(5, true);
        backend.push_chat_failure("backend returned 500");

        let mut orchestrator = orchestrator_with(&backend);
        let id = orchestrator.store().active_id().to_string();
        orchestrator.submit_upload(&id, &path).await.unwrap();
        let before = orchestrator.store().get(&id).unwrap().messages().len();

        let outcome = orchestrator.submit_query(&id, "find ships").await.unwrap();

        assert_eq!(outcome, Submission::Completed);
        let session = orchestrator.store().get(&id).unwrap();
        // User message plus assistant error entry; the user message stays.
        assert_eq!(session.messages().len(), before + 2);
        let last = session.messages().last().unwrap();
        assert!(last.text.starts_with("Error:"));
        assert!(!orchestrator.analyzing());
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn late_chat_response_for_deleted_session_is_discarded() {
        let backend = Arc::new(MockBackend::new());
        let mut orchestrator = orchestrator_with(&backend);
        let target = orchestrator.store().active_id().to_string();
        orchestrator.store_mut().create();
        orchestrator.store_mut().delete(&target).unwrap();

        let transcript_lens: Vec<usize> = orchestrator
            .store()
            .list()
            .iter()
            .map(|s| s.messages().len())
            .collect();

        // The response arrives after its originating session is gone.
        let response = crate::backend::ChatResponse {
            reply: Some("late reply".to_string()),
            grounding: Vec::new(),
        };
        let outcome = orchestrator
            .apply_chat_outcome(&target, Ok(response))
            .unwrap();

        assert_eq!(outcome, Submission::Discarded);
        let after: Vec<usize> = orchestrator
            .store()
            .list()
            .iter()
            .map(|s| s.messages().len())
            .collect();
        assert_eq!(transcript_lens, after);
    }

    #[tokio::test(start_paused = true)]
    async fn late_upload_response_for_deleted_session_is_discarded() {
        let backend = Arc::new(MockBackend::new());
        let mut orchestrator = orchestrator_with(&backend);
        let target = orchestrator.store().active_id().to_string();
        orchestrator.store_mut().create();
        orchestrator.store_mut().delete(&target).unwrap();

        let response = crate::backend::UploadResponse {
            url: "/files/x.png".to_string(),
            file_id: "x-1".to_string(),
        };
        let outcome = orchestrator
            .apply_upload_outcome(&target, "x.png", Ok(response))
            .await
            .unwrap();

        assert_eq!(outcome, Submission::Discarded);
        assert_eq!(orchestrator.store().list().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_image_returns_session_to_no_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_image(&dir, "coast.png");
        let backend = Arc::new(MockBackend::new());
        backend.push_upload("/files/coast.png", "img-6");
        backend.push_status(5, true);

        let mut orchestrator = orchestrator_with(&backend);
        let id = orchestrator.store().active_id().to_string();
        orchestrator.submit_upload(&id, &path).await.unwrap();
        assert!(orchestrator.store().get(&id).unwrap().image.remote().is_some());

        orchestrator.remove_image(&id).unwrap();

        let session = orchestrator.store().get(&id).unwrap();
        assert!(session.image.is_empty());
        assert_eq!(orchestrator.upload_phase(&id).unwrap(), UploadPhase::NoImage);

        // A query now requires a fresh upload again.
        let outcome = orchestrator.submit_query(&id, "still there?").await.unwrap();
        assert_eq!(outcome, Submission::Rejected);
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_image_content_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "not an image").unwrap();

        let backend = Arc::new(MockBackend::new());
        let mut orchestrator = orchestrator_with(&backend);
        let id = orchestrator.store().active_id().to_string();

        let err = orchestrator.submit_upload(&id, &path).await.unwrap_err();
        assert!(matches!(err, Error::InvalidImage { .. }));
        assert_eq!(backend.upload_calls(), 0);
    }
}
