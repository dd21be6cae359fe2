//! In-memory session store.
//!
//! Owns every session and transcript for the lifetime of the process. All
//! operations are synchronous and atomic with respect to the single owning
//! task; nothing survives a restart.

use std::path::Path;

use log::debug;

use crate::error::{Error, Result};
use crate::models::{Detection, ImageState, MessageRole, RemoteImage, Session};

/// Seed transcript entry for every new session.
pub const WELCOME_MESSAGE: &str = "Welcome to sightline.\n\
    1. Upload a satellite image to initialize the system.\n\
    2. Ask questions to locate objects or describe the scene.";

/// Ordered collection of conversation sessions, newest first.
///
/// The store is never empty: it starts with one session and refuses to
/// delete the last one.
pub struct SessionStore {
    sessions: Vec<Session>,
    active: String,
}

impl SessionStore {
    /// A store starts with one welcome session, which becomes active.
    pub fn new() -> Self {
        let session = seeded_session();
        let active = session.id.clone();
        Self {
            sessions: vec![session],
            active,
        }
    }

    /// Sessions in display order (most recently created first).
    pub fn list(&self) -> &[Session] {
        &self.sessions
    }

    /// Id of the active session.
    pub fn active_id(&self) -> &str {
        &self.active
    }

    /// The active session.
    pub fn active(&self) -> &Session {
        self.sessions
            .iter()
            .find(|s| s.id == self.active)
            .unwrap_or(&self.sessions[0])
    }

    /// Make `id` the active session.
    pub fn set_active(&mut self, id: &str) -> Result<()> {
        let session = self.get(id)?;
        self.active = session.id.clone();
        Ok(())
    }

    /// Look up a session by id.
    pub fn get(&self, id: &str) -> Result<&Session> {
        self.sessions
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Session> {
        self.sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    /// Prepend a new welcome session and make it active.
    pub fn create(&mut self) -> &Session {
        let session = seeded_session();
        self.active = session.id.clone();
        debug!("created session {}", session.id);
        self.sessions.insert(0, session);
        &self.sessions[0]
    }

    /// Change a session's title. Whitespace-only titles are rejected and the
    /// prior title is left unchanged.
    pub fn rename(&mut self, id: &str, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::EmptyTitle);
        }
        let session = self.get_mut(id)?;
        session.title = title.to_string();
        Ok(())
    }

    /// Delete a session. The last remaining session cannot be deleted; if the
    /// deleted session was active, activation moves to the new first session.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        let index = self
            .sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
        if self.sessions.len() == 1 {
            return Err(Error::LastSession);
        }
        self.sessions.remove(index);
        if self.active == id {
            self.active = self.sessions[0].id.clone();
        }
        debug!("deleted session {id}");
        Ok(())
    }

    /// Append a message to a session's transcript.
    pub fn append_message(
        &mut self,
        id: &str,
        role: MessageRole,
        text: String,
        grounding: Vec<Detection>,
    ) -> Result<u64> {
        let session = self.get_mut(id)?;
        Ok(session.push_message(role, text, grounding))
    }

    /// Record the optimistic local preview for an upload in flight.
    pub fn set_preview(&mut self, id: &str, path: &Path) -> Result<()> {
        let session = self.get_mut(id)?;
        session.image = ImageState::Pending {
            preview: path.to_path_buf(),
        };
        Ok(())
    }

    /// Confirm a pending upload with its backend reference.
    pub fn attach_remote(&mut self, id: &str, remote: RemoteImage) -> Result<()> {
        let session = self.get_mut(id)?;
        match &session.image {
            ImageState::Pending { preview } => {
                session.image = ImageState::Uploaded {
                    preview: preview.clone(),
                    remote,
                };
                Ok(())
            }
            _ => Err(Error::ImageMissing),
        }
    }

    /// Drop the session's image: preview and backend reference go together.
    pub fn clear_image(&mut self, id: &str) -> Result<()> {
        let session = self.get_mut(id)?;
        session.image = ImageState::Empty;
        Ok(())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn seeded_session() -> Session {
    let mut session = Session::new();
    session.push_message(MessageRole::Assistant, WELCOME_MESSAGE.to_string(), Vec::new());
    session
}
