use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::app::domain::context::SessionContext;
use crate::app::domain::document::{DocumentId, DocumentSession};
use crate::app::infrastructure::error::{AppError, Result};

/// What `open_paths` did, per request.
#[derive(Debug, Default)]
pub struct OpenReport {
    /// Newly created sessions, in request order.
    pub opened: Vec<DocumentId>,
    /// Requests that matched an existing session.
    pub reused: Vec<DocumentId>,
    pub failures: Vec<(PathBuf, AppError)>,
}

impl OpenReport {
    pub fn is_empty(&self) -> bool {
        self.opened.is_empty() && self.reused.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// A tab was closed and another one is now active.
    Closed(DocumentId),
    /// The last tab was closed. Reported once per transition to empty.
    Empty(DocumentId),
    NothingToClose,
}

/// Ordered open sessions plus the active one.
#[derive(Debug)]
pub struct TabManager {
    sessions: Vec<DocumentSession>,
    active_id: Option<DocumentId>,
    next_id: u64,
}

impl Default for TabManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TabManager {
    pub fn new() -> Self {
        Self {
            sessions: Vec::new(),
            active_id: None,
            next_id: 1,
        }
    }

    fn next_document_id(&mut self) -> DocumentId {
        let id = DocumentId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Open each path in order. Existing sessions are reused, and the last
    /// path that opened or matched ends up active. Failures are collected
    /// without stopping the remaining paths.
    pub fn open_paths(&mut self, paths: &[PathBuf], ctx: &SessionContext) -> OpenReport {
        let mut report = OpenReport::default();

        for requested in paths {
            let canonical = match requested.canonicalize() {
                Ok(path) => path,
                Err(e) => {
                    warn!(path = %requested.display(), error = %e, "cannot open document");
                    report.failures.push((requested.clone(), AppError::open(requested, e)));
                    continue;
                }
            };

            if let Some(id) = self.find_by_path(&canonical) {
                debug!(id = id.0, path = %canonical.display(), "document already open");
                self.activate_id(id, ctx);
                report.reused.push(id);
                continue;
            }

            match self.open_one(&canonical, ctx) {
                Ok(id) => report.opened.push(id),
                Err(e) => {
                    warn!(path = %requested.display(), error = %e, "cannot open document");
                    report.failures.push((requested.clone(), e));
                }
            }
        }

        report
    }

    fn open_one(&mut self, canonical: &Path, ctx: &SessionContext) -> Result<DocumentId> {
        let id = self.next_document_id();
        let session = DocumentSession::open(id, canonical, ctx)?;
        self.sessions.push(session);
        self.active_id = Some(id);
        Ok(id)
    }

    /// Close the active session and activate the neighbor at the same index.
    pub fn close_active(&mut self) -> CloseOutcome {
        let Some(active_id) = self.active_id else {
            return CloseOutcome::NothingToClose;
        };
        let Some(idx) = self.index_of(active_id) else {
            self.active_id = None;
            return CloseOutcome::NothingToClose;
        };

        let mut session = self.sessions.remove(idx);
        session.close();
        info!(id = active_id.0, path = %session.path().display(), "document closed");

        if self.sessions.is_empty() {
            self.active_id = None;
            return CloseOutcome::Empty(active_id);
        }

        // Activate nearest neighbor
        let new_idx = if idx >= self.sessions.len() {
            self.sessions.len() - 1
        } else {
            idx
        };
        self.active_id = Some(self.sessions[new_idx].id);
        CloseOutcome::Closed(active_id)
    }

    /// Activate the tab at `index`. Out of range is a no-op.
    pub fn activate(&mut self, index: usize, ctx: &SessionContext) -> bool {
        let Some(id) = self.sessions.get(index).map(|s| s.id) else {
            debug!(index, count = self.sessions.len(), "ignoring activation of missing tab");
            return false;
        };
        self.activate_id(id, ctx)
    }

    /// Activate a session by id, refreshing it first if it went stale
    /// while in the background.
    pub fn activate_id(&mut self, id: DocumentId, ctx: &SessionContext) -> bool {
        let Some(session) = self.session_mut(id) else {
            return false;
        };
        if session.is_stale() {
            match session.refresh(ctx) {
                Ok(outcome) => debug!(id = id.0, ?outcome, "refreshed on activation"),
                Err(e) => warn!(id = id.0, error = %e, "refresh on activation failed"),
            }
        }
        self.active_id = Some(id);
        true
    }

    pub fn next(&mut self, ctx: &SessionContext) -> bool {
        match self.next_doc_id() {
            Some(id) => self.activate_id(id, ctx),
            None => false,
        }
    }

    pub fn previous(&mut self, ctx: &SessionContext) -> bool {
        match self.prev_doc_id() {
            Some(id) => self.activate_id(id, ctx),
            None => false,
        }
    }

    /// Get the next document id (for tab cycling)
    fn next_doc_id(&self) -> Option<DocumentId> {
        let idx = self.active_index()?;
        let next_idx = (idx + 1) % self.sessions.len();
        Some(self.sessions[next_idx].id)
    }

    /// Get the previous document id (for tab cycling)
    fn prev_doc_id(&self) -> Option<DocumentId> {
        let idx = self.active_index()?;
        let prev_idx = if idx == 0 {
            self.sessions.len() - 1
        } else {
            idx - 1
        };
        Some(self.sessions[prev_idx].id)
    }

    /// Move the tab at `from` so it ends up at index `to` (clamped).
    /// The active session does not change.
    pub fn move_tab(&mut self, from: usize, to: usize) {
        if from >= self.sessions.len() {
            return;
        }
        let to = to.min(self.sessions.len() - 1);
        if from == to {
            return;
        }
        let session = self.sessions.remove(from);
        self.sessions.insert(to, session);
    }

    /// Flag sessions showing `path` as changed on disk. Background
    /// sessions only go stale; returns the id when the active session is
    /// affected so the caller can refresh it now.
    pub fn mark_changed(&mut self, path: &Path) -> Option<DocumentId> {
        let id = self.find_by_path(path)?;
        let session = self.session_mut(id)?;
        session.mark_stale();
        (self.active_id == Some(id)).then_some(id)
    }

    /// Flag sessions showing `path` as deleted. The last render stays.
    pub fn mark_removed(&mut self, path: &Path) -> Option<DocumentId> {
        let id = self.find_by_path(path)?;
        let session = self.session_mut(id)?;
        session.mark_missing();
        warn!(id = id.0, path = %path.display(), "document file removed");
        Some(id)
    }

    /// Recompose every session after a theme or config change.
    pub fn restyle_all(&mut self, ctx: &SessionContext) {
        for session in &mut self.sessions {
            session.restyle(ctx);
        }
    }

    pub fn sessions(&self) -> &[DocumentSession] {
        &self.sessions
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.sessions.iter().map(|s| s.path())
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn active_id(&self) -> Option<DocumentId> {
        self.active_id
    }

    pub fn active_index(&self) -> Option<usize> {
        self.index_of(self.active_id?)
    }

    pub fn active(&self) -> Option<&DocumentSession> {
        let active_id = self.active_id?;
        self.session(active_id)
    }

    pub fn active_mut(&mut self) -> Option<&mut DocumentSession> {
        let active_id = self.active_id?;
        self.session_mut(active_id)
    }

    pub fn session(&self, id: DocumentId) -> Option<&DocumentSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn session_mut(&mut self, id: DocumentId) -> Option<&mut DocumentSession> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    fn index_of(&self, id: DocumentId) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == id)
    }

    /// Find a session by canonical path.
    pub fn find_by_path(&self, path: &Path) -> Option<DocumentId> {
        self.sessions.iter().find(|s| s.path() == path).map(|s| s.id)
    }
}
