//! Browser-backed preview surface.
//!
//! Each session is written to its own HTML file under the temp dir and
//! opened once in the system browser. Later presents rewrite the file in
//! place; status goes to the terminal.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::app::domain::document::DocumentId;
use crate::app::infrastructure::error::{AppError, Result};
use crate::ui::{DisplaySurface, Frame};

const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown", "mdown", "mkd"];

/// Directory for preview files.
pub fn preview_dir() -> PathBuf {
    std::env::temp_dir().join("mdview-preview")
}

pub struct PreviewSurface<W: Write> {
    dir: PathBuf,
    out: W,
    open_in_browser: bool,
    opened: HashSet<DocumentId>,
    written: HashMap<DocumentId, u64>,
}

impl PreviewSurface<io::Stdout> {
    /// Surface writing under [`preview_dir`] with status on stdout.
    pub fn stdout() -> Result<Self> {
        Self::new(preview_dir(), io::stdout(), true)
    }
}

impl<W: Write> PreviewSurface<W> {
    pub fn new(dir: PathBuf, out: W, open_in_browser: bool) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            out,
            open_in_browser,
            opened: HashSet::new(),
            written: HashMap::new(),
        })
    }

    pub fn preview_path(&self, id: DocumentId) -> PathBuf {
        self.dir.join(format!("doc-{}.html", id.0))
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    fn status(&mut self, line: &str) {
        if writeln!(self.out, "{line}").and_then(|_| self.out.flush()).is_err() {
            debug!("status output closed");
        }
    }

    fn open_once(&mut self, id: DocumentId, path: &Path) -> Result<()> {
        if !self.open_in_browser || self.opened.contains(&id) {
            return Ok(());
        }
        open::that(path).map_err(|source| AppError::Launch {
            command: format!("open {}", path.display()),
            source,
        })?;
        self.opened.insert(id);
        Ok(())
    }
}

impl<W: Write> DisplaySurface for PreviewSurface<W> {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        let target = self.preview_path(frame.id);
        if self.written.get(&frame.id) != Some(&frame.revision) {
            fs::write(&target, &frame.html)?;
            self.written.insert(frame.id, frame.revision);
            debug!(id = frame.id.0, revision = frame.revision, path = %target.display(), "preview written");
        }
        self.open_once(frame.id, &target)?;

        let line = format!(
            "[{}/{}] {}  {}%",
            frame.index + 1,
            frame.count,
            frame.title,
            frame.style.zoom_percent(),
        );
        self.status(&line);
        Ok(())
    }

    fn show_empty(&mut self) {
        self.status("No documents open. Type `open PATH...` or <Ctrl>o.");
    }

    fn forget(&mut self, id: DocumentId) {
        self.opened.remove(&id);
        if self.written.remove(&id).is_some() {
            let path = self.preview_path(id);
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "cannot remove preview file");
            }
        }
    }

    fn notify(&mut self, message: &str) {
        self.status(&format!("! {message}"));
    }

    /// Lists markdown files in `start_dir`; the answer comes back as an
    /// `open PATH...` line on the input stream.
    fn pick_files(&mut self, start_dir: &Path) -> Option<Vec<PathBuf>> {
        let mut candidates: Vec<PathBuf> = match fs::read_dir(start_dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| is_markdown(path))
                .collect(),
            Err(e) => {
                warn!(dir = %start_dir.display(), error = %e, "cannot list directory");
                Vec::new()
            }
        };
        candidates.sort();

        self.status(&format!("Markdown files in {}:", start_dir.display()));
        for path in &candidates {
            self.status(&format!("  {}", path.display()));
        }
        self.status("Type `open PATH...` to open.");
        None
    }
}

fn is_markdown(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| MARKDOWN_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::domain::config::Config;
    use crate::app::services::renderer::StyleParams;

    fn frame(id: u64, revision: u64, html: &str) -> Frame {
        Frame {
            id: DocumentId(id),
            title: "notes.md".to_string(),
            path: PathBuf::from("/tmp/notes.md"),
            html: html.to_string(),
            style: StyleParams::new(&Config::default(), 1.25),
            revision,
            index: 1,
            count: 3,
            stale: false,
        }
    }

    fn output(surface: &PreviewSurface<Vec<u8>>) -> String {
        String::from_utf8_lossy(surface.writer()).to_string()
    }

    #[test]
    fn test_present_writes_file_and_status() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let mut surface =
            PreviewSurface::new(dir.path().join("preview"), Vec::new(), false).expect("surface");

        surface.present(&frame(7, 1, "<p>one</p>")).expect("present");
        let written = fs::read_to_string(surface.preview_path(DocumentId(7))).expect("read");
        assert_eq!(written, "<p>one</p>");
        assert!(output(&surface).contains("[2/3] notes.md  125%"));
    }

    #[test]
    fn test_same_revision_is_not_rewritten() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let mut surface = PreviewSurface::new(dir.path().to_path_buf(), Vec::new(), false)
            .expect("surface");

        surface.present(&frame(1, 1, "<p>first</p>")).expect("present");
        let path = surface.preview_path(DocumentId(1));
        fs::write(&path, "tampered").expect("tamper");

        surface.present(&frame(1, 1, "<p>first</p>")).expect("present again");
        assert_eq!(fs::read_to_string(&path).expect("read"), "tampered");

        surface.present(&frame(1, 2, "<p>second</p>")).expect("present new revision");
        assert_eq!(fs::read_to_string(&path).expect("read"), "<p>second</p>");
    }

    #[test]
    fn test_forget_removes_preview_file() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let mut surface = PreviewSurface::new(dir.path().to_path_buf(), Vec::new(), false)
            .expect("surface");

        surface.present(&frame(3, 1, "x")).expect("present");
        let path = surface.preview_path(DocumentId(3));
        assert!(path.exists());
        surface.forget(DocumentId(3));
        assert!(!path.exists());
    }

    #[test]
    fn test_pick_files_lists_markdown_only() {
        let dir = tempfile::tempdir().expect("create tempdir");
        fs::write(dir.path().join("a.md"), "a").expect("write");
        fs::write(dir.path().join("b.MARKDOWN"), "b").expect("write");
        fs::write(dir.path().join("c.txt"), "c").expect("write");

        let preview = tempfile::tempdir().expect("create tempdir");
        let mut surface = PreviewSurface::new(preview.path().to_path_buf(), Vec::new(), false)
            .expect("surface");

        assert!(surface.pick_files(dir.path()).is_none());
        let text = output(&surface);
        assert!(text.contains("a.md"));
        assert!(text.contains("b.MARKDOWN"));
        assert!(!text.contains("c.txt"));
    }

    #[test]
    fn test_notify_prefixes_message() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let mut surface = PreviewSurface::new(dir.path().to_path_buf(), Vec::new(), false)
            .expect("surface");
        surface.notify("editor failed");
        assert_eq!(output(&surface), "! editor failed\n");
    }
}
