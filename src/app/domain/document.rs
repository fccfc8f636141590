use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::app::domain::config::{ZOOM_STEP, clamp_zoom};
use crate::app::domain::context::SessionContext;
use crate::app::infrastructure::error::{AppError, Result};
use crate::app::infrastructure::launcher::{LaunchRequest, ProcessLauncher};
use crate::app::services::renderer::{RenderedOutput, StyleParams, compose, render_markdown};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub u64);

/// Session lifecycle: `Loading -> Ready -> {Stale -> Ready, Closed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Ready,
    Stale,
    Closed,
}

/// Result of re-reading the backing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reload {
    /// Same bytes as the cached content; nothing to render.
    Unchanged,
    /// The file is gone; the last good render stays up.
    Missing,
    /// New content was read and needs a structural render.
    Changed(RenderTicket),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Unchanged,
    Rerendered,
    Missing,
}

/// A structural render request detached from the session, so it can run
/// on a worker. Only the ticket for the newest content can land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTicket {
    pub id: DocumentId,
    pub content_revision: u64,
    pub content: String,
}

/// The live state of one open document.
#[derive(Debug)]
pub struct DocumentSession {
    pub id: DocumentId,
    path: PathBuf,
    display_name: String,
    content: String,
    /// Cached structural render of `content`.
    body: String,
    output: Option<RenderedOutput>,
    zoom: f64,
    state: SessionState,
    /// Bumped every time `output` is replaced.
    revision: u64,
    /// Bumped every time new content is read from disk.
    content_revision: u64,
    rendered_content_revision: u64,
    missing: bool,
}

impl DocumentSession {
    /// Read `path` (already canonical) and render it.
    pub fn open(id: DocumentId, path: &Path, ctx: &SessionContext) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| AppError::open(path, e))?;

        let mut session = Self {
            id,
            path: path.to_path_buf(),
            display_name: extract_filename(path),
            content,
            body: String::new(),
            output: None,
            zoom: ctx.config.initial_zoom(),
            state: SessionState::Loading,
            revision: 0,
            content_revision: 1,
            rendered_content_revision: 0,
            missing: false,
        };

        let ticket = session.ticket();
        let body = render_markdown(&ticket.content);
        session.complete_render(ticket, body, ctx);

        info!(id = id.0, path = %path.display(), "document opened");
        Ok(session)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Tab label. Flags a session whose file is gone.
    pub fn title(&self) -> String {
        if self.missing {
            format!("{} (missing)", self.display_name)
        } else {
            self.display_name.clone()
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn output(&self) -> Option<&RenderedOutput> {
        self.output.as_ref()
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_stale(&self) -> bool {
        self.state == SessionState::Stale
    }

    /// True once the backing file disappeared. The session keeps showing
    /// its last render until the file comes back.
    pub fn is_missing(&self) -> bool {
        self.missing
    }

    fn ticket(&self) -> RenderTicket {
        RenderTicket {
            id: self.id,
            content_revision: self.content_revision,
            content: self.content.clone(),
        }
    }

    /// Flag that the file changed on disk. No work is done until the
    /// session is refreshed.
    pub fn mark_stale(&mut self) {
        if self.state != SessionState::Closed {
            self.state = SessionState::Stale;
            debug!(id = self.id.0, "document marked stale");
        }
    }

    /// Flag that the file was removed on disk.
    pub fn mark_missing(&mut self) {
        self.missing = true;
        self.mark_stale();
    }

    /// Re-read the backing file. Content is replaced only when it differs.
    pub fn reload_content(&mut self) -> Result<Reload> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                self.missing = false;
                if content == self.content {
                    if self.rendered_content_revision == self.content_revision {
                        self.state = SessionState::Ready;
                        return Ok(Reload::Unchanged);
                    }
                    // A render for this content is still outstanding.
                    return Ok(Reload::Changed(self.ticket()));
                }
                self.content = content;
                self.content_revision += 1;
                Ok(Reload::Changed(self.ticket()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(id = self.id.0, path = %self.path.display(), "document file disappeared");
                self.mark_missing();
                Ok(Reload::Missing)
            }
            Err(e) => {
                self.mark_stale();
                Err(AppError::open(&self.path, e))
            }
        }
    }

    /// Re-read and, if the content changed, re-render in place.
    pub fn refresh(&mut self, ctx: &SessionContext) -> Result<RefreshOutcome> {
        match self.reload_content()? {
            Reload::Unchanged => Ok(RefreshOutcome::Unchanged),
            Reload::Missing => Ok(RefreshOutcome::Missing),
            Reload::Changed(ticket) => {
                let body = render_markdown(&ticket.content);
                self.complete_render(ticket, body, ctx);
                Ok(RefreshOutcome::Rerendered)
            }
        }
    }

    /// Apply a finished structural render. Returns false, leaving the
    /// session untouched, when newer content superseded the ticket or it
    /// was already applied.
    pub fn complete_render(&mut self, ticket: RenderTicket, body: String, ctx: &SessionContext) -> bool {
        if ticket.id != self.id
            || ticket.content_revision != self.content_revision
            || ticket.content_revision <= self.rendered_content_revision
        {
            debug!(
                id = self.id.0,
                ticket = ticket.content_revision,
                current = self.content_revision,
                "discarding superseded render"
            );
            return false;
        }

        self.body = body;
        self.rendered_content_revision = ticket.content_revision;
        self.recompose(ctx);
        if !self.missing {
            self.state = SessionState::Ready;
        }
        true
    }

    /// Rebuild the output around the cached body, e.g. after a theme or
    /// zoom change. No disk read, no markdown parse.
    pub fn restyle(&mut self, ctx: &SessionContext) {
        self.recompose(ctx);
    }

    fn recompose(&mut self, ctx: &SessionContext) {
        let style = StyleParams::new(&ctx.config, self.zoom);
        let output = compose(&self.body, self.path.parent(), &style, &ctx.theme);
        self.output = Some(output);
        self.revision += 1;
    }

    /// Set the zoom override, clamped. Returns the applied level.
    pub fn set_zoom(&mut self, level: f64, ctx: &SessionContext) -> f64 {
        let level = clamp_zoom(level);
        if (level - self.zoom).abs() > f64::EPSILON {
            self.zoom = level;
            self.recompose(ctx);
            debug!(id = self.id.0, zoom = level, "zoom changed");
        }
        self.zoom
    }

    pub fn zoom_in(&mut self, ctx: &SessionContext) -> f64 {
        self.set_zoom(round_zoom(self.zoom + ZOOM_STEP), ctx)
    }

    pub fn zoom_out(&mut self, ctx: &SessionContext) -> f64 {
        self.set_zoom(round_zoom(self.zoom - ZOOM_STEP), ctx)
    }

    pub fn zoom_reset(&mut self, ctx: &SessionContext) -> f64 {
        self.set_zoom(ctx.config.initial_zoom(), ctx)
    }

    /// Hand the file to the external editor. The process is not tracked;
    /// edits come back through the file watch.
    pub fn edit(&self, launcher: &dyn ProcessLauncher, ctx: &SessionContext) -> Result<()> {
        launcher.launch(&LaunchRequest::edit(&ctx.config, &self.path))
    }

    pub fn close(&mut self) {
        self.state = SessionState::Closed;
        debug!(id = self.id.0, "document closed");
    }
}

/// Keep repeated steps from accumulating float noise (1.2000000000000002).
fn round_zoom(level: f64) -> f64 {
    (level * 100.0).round() / 100.0
}

pub fn extract_filename(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .filter(|s| !s.is_empty() && *s != ".")
        .map(|s| s.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::app::domain::config::{Config, MAX_ZOOM, MIN_ZOOM};
    use crate::app::domain::theme::Theme;

    #[derive(Default)]
    struct RecordingLauncher {
        requests: RefCell<Vec<LaunchRequest>>,
    }

    impl ProcessLauncher for RecordingLauncher {
        fn launch(&self, request: &LaunchRequest) -> Result<()> {
            self.requests.borrow_mut().push(request.clone());
            Ok(())
        }
    }

    fn write_doc(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).expect("write doc");
        path.canonicalize().expect("canonicalize")
    }

    #[test]
    fn test_open_renders_initial_output() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = write_doc(dir.path(), "readme.md", "# Hello\n");
        let session = DocumentSession::open(DocumentId(1), &path, &SessionContext::default())
            .expect("open");

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.revision(), 1);
        assert_eq!(session.display_name(), "readme.md");
        let html = &session.output().expect("output").html;
        assert!(html.contains("<h1 id=\"hello\">Hello</h1>"));
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let result = DocumentSession::open(
            DocumentId(1),
            &dir.path().join("nope.md"),
            &SessionContext::default(),
        );
        assert!(matches!(result, Err(AppError::Open { .. })));
    }

    #[test]
    fn test_refresh_without_change_skips_render() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = write_doc(dir.path(), "a.md", "same");
        let ctx = SessionContext::default();
        let mut session = DocumentSession::open(DocumentId(1), &path, &ctx).expect("open");

        session.mark_stale();
        let outcome = session.refresh(&ctx).expect("refresh");
        assert_eq!(outcome, RefreshOutcome::Unchanged);
        assert_eq!(session.revision(), 1);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_refresh_with_change_rerenders() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = write_doc(dir.path(), "a.md", "before");
        let ctx = SessionContext::default();
        let mut session = DocumentSession::open(DocumentId(1), &path, &ctx).expect("open");

        fs::write(&path, "after").expect("rewrite");
        session.mark_stale();
        assert_eq!(session.refresh(&ctx).expect("refresh"), RefreshOutcome::Rerendered);
        assert_eq!(session.revision(), 2);
        assert_eq!(session.content(), "after");
        assert!(session.output().expect("output").html.contains("after"));
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_deleted_file_keeps_last_render() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = write_doc(dir.path(), "a.md", "kept");
        let ctx = SessionContext::default();
        let mut session = DocumentSession::open(DocumentId(1), &path, &ctx).expect("open");

        fs::remove_file(&path).expect("remove");
        assert_eq!(session.refresh(&ctx).expect("refresh"), RefreshOutcome::Missing);
        assert!(session.is_stale());
        assert!(session.is_missing());
        assert_eq!(session.title(), "a.md (missing)");
        assert!(session.output().expect("output").html.contains("kept"));

        fs::write(&path, "back again").expect("recreate");
        assert_eq!(session.refresh(&ctx).expect("refresh"), RefreshOutcome::Rerendered);
        assert!(!session.is_missing());
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_set_zoom_clamps_and_uses_cached_content() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = write_doc(dir.path(), "a.md", "zoom me");
        let ctx = SessionContext::default();
        let mut session = DocumentSession::open(DocumentId(1), &path, &ctx).expect("open");

        // No disk read on zoom: the file can be gone.
        fs::remove_file(&path).expect("remove");

        assert_eq!(session.set_zoom(7.0, &ctx), MAX_ZOOM);
        assert_eq!(session.set_zoom(-1.0, &ctx), MIN_ZOOM);
        assert_eq!(session.set_zoom(1.5, &ctx), 1.5);
        let output = session.output().expect("output");
        assert_eq!(output.style.zoom, 1.5);
        assert!(output.html.contains("font-size: 24px;"));
        assert!(output.html.contains("zoom me"));
    }

    #[test]
    fn test_zoom_steps() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = write_doc(dir.path(), "a.md", "x");
        let ctx = SessionContext::new(
            Config {
                zoom_level: 1.2,
                ..Config::default()
            },
            Theme::empty(),
        );
        let mut session = DocumentSession::open(DocumentId(1), &path, &ctx).expect("open");
        assert_eq!(session.zoom(), 1.2);
        assert_eq!(session.zoom_in(&ctx), 1.3);
        assert_eq!(session.zoom_out(&ctx), 1.2);
        assert_eq!(session.zoom_out(&ctx), 1.1);
        assert_eq!(session.zoom_reset(&ctx), 1.2);

        session.set_zoom(MAX_ZOOM, &ctx);
        assert_eq!(session.zoom_in(&ctx), MAX_ZOOM);
    }

    #[test]
    fn test_superseded_ticket_is_discarded() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = write_doc(dir.path(), "a.md", "v1");
        let ctx = SessionContext::default();
        let mut session = DocumentSession::open(DocumentId(1), &path, &ctx).expect("open");

        fs::write(&path, "v2").expect("write v2");
        let Reload::Changed(old_ticket) = session.reload_content().expect("reload") else {
            panic!("expected changed content");
        };
        fs::write(&path, "v3 longer").expect("write v3");
        let Reload::Changed(new_ticket) = session.reload_content().expect("reload") else {
            panic!("expected changed content");
        };

        let new_body = render_markdown(&new_ticket.content);
        assert!(session.complete_render(new_ticket, new_body, &ctx));
        let revision = session.revision();

        let old_body = render_markdown(&old_ticket.content);
        assert!(!session.complete_render(old_ticket, old_body, &ctx));
        assert_eq!(session.revision(), revision);
        assert!(session.output().expect("output").html.contains("v3 longer"));
    }

    #[test]
    fn test_restyle_applies_new_theme_without_reparse() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = write_doc(dir.path(), "a.md", "text");
        let mut ctx = SessionContext::default();
        let mut session = DocumentSession::open(DocumentId(1), &path, &ctx).expect("open");

        ctx.theme = Theme::from_css("--background: #abcdef;");
        session.restyle(&ctx);
        assert_eq!(session.revision(), 2);
        assert!(session.output().expect("output").html.contains("--mdv-background: #abcdef;"));
    }

    #[test]
    fn test_edit_hands_path_to_launcher() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = write_doc(dir.path(), "a.md", "x");
        let ctx = SessionContext::default();
        let session = DocumentSession::open(DocumentId(1), &path, &ctx).expect("open");

        let launcher = RecordingLauncher::default();
        session.edit(&launcher, &ctx).expect("edit");
        let requests = launcher.requests.borrow();
        assert_eq!(requests.len(), 1);
        assert!(matches!(&requests[0], LaunchRequest::Editor { path: p, .. } if p == &path));
    }

    #[test]
    fn test_close_is_terminal() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = write_doc(dir.path(), "a.md", "x");
        let mut session =
            DocumentSession::open(DocumentId(1), &path, &SessionContext::default()).expect("open");
        session.close();
        session.mark_stale();
        assert_eq!(session.state(), SessionState::Closed);
    }
}
