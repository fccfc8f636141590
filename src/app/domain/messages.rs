use std::path::PathBuf;

use crate::app::controllers::commands::Action;
use crate::app::domain::document::RenderTicket;
use crate::app::domain::theme::Theme;

/// Everything that reaches the control thread. Background threads (stdin,
/// file watchers, render workers) only ever send one of these; all state
/// changes happen where the channel is drained.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A raw gesture: an accelerator (`<Ctrl>w`) or an action name.
    Input(String),
    Command(Action),
    OpenRequested(Vec<PathBuf>),

    // Watchers
    FileChanged(PathBuf),
    FileRemoved(PathBuf),
    ThemeChanged(Theme),

    /// A worker finished the structural render for `ticket`.
    Rendered { ticket: RenderTicket, body: String },

    /// The input source closed or failed; no further gestures will arrive.
    /// File and theme events keep flowing.
    InputClosed,
}
