//! Display boundary.
//!
//! The app never paints anything itself. It hands the active session's
//! styled output to a [`DisplaySurface`] and lets the host decide how to
//! show it.

pub mod preview_surface;

use std::path::{Path, PathBuf};

use crate::app::domain::document::DocumentId;
use crate::app::infrastructure::error::Result;
use crate::app::services::renderer::StyleParams;

/// One presentable snapshot of the active session.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub id: DocumentId,
    pub title: String,
    pub path: PathBuf,
    pub html: String,
    pub style: StyleParams,
    pub revision: u64,
    /// Zero-based tab position.
    pub index: usize,
    pub count: usize,
    pub stale: bool,
}

pub trait DisplaySurface {
    fn present(&mut self, frame: &Frame) -> Result<()>;

    /// Nothing is open.
    fn show_empty(&mut self);

    /// The session is gone; release whatever was shown for it.
    fn forget(&mut self, id: DocumentId);

    /// Non-fatal message for the user.
    fn notify(&mut self, message: &str);

    /// Ask the user for files to open, starting in `start_dir`. `None`
    /// when the surface cannot answer synchronously or the user cancelled.
    fn pick_files(&mut self, start_dir: &Path) -> Option<Vec<PathBuf>>;
}
