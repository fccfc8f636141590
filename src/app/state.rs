use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};
use std::thread;

use tracing::{debug, error, info, warn};

use super::controllers::commands::{Action, CommandTarget, Dispatcher, split_arguments};
use super::controllers::tabs::{CloseOutcome, TabManager};
use super::domain::context::SessionContext;
use super::domain::document::{DocumentId, Reload, RenderTicket};
use super::domain::messages::AppEvent;
use super::infrastructure::error::AppError;
use super::infrastructure::launcher::{LaunchRequest, ProcessLauncher};
use super::services::config_store::{ConfigStore, expand_home};
use super::services::renderer::render_markdown;
use super::services::theme_resolver::ThemeResolver;
use super::services::watcher::{DEBOUNCE_DELAY, PathWatcher, WatchEvent};
use crate::ui::{DisplaySurface, Frame};

/// Documents above this size are parsed on a worker thread.
pub const LARGE_DOCUMENT_BYTES: usize = 512 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Sole owner of all mutable state. Lives on the thread that drains the
/// event channel; everything else only sends [`AppEvent`]s.
pub struct App {
    store: ConfigStore,
    theme_resolver: ThemeResolver,
    ctx: SessionContext,
    tabs: TabManager,
    dispatcher: Dispatcher,
    launcher: Box<dyn ProcessLauncher>,
    surface: Box<dyn DisplaySurface>,
    sender: Sender<AppEvent>,
    doc_watcher: Option<PathWatcher>,
    theme_watcher: Option<PathWatcher>,
    exit_requested: bool,
}

impl App {
    pub fn new(
        store: ConfigStore,
        launcher: Box<dyn ProcessLauncher>,
        mut surface: Box<dyn DisplaySurface>,
        sender: Sender<AppEvent>,
    ) -> Self {
        let config = match store.load() {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "using default config");
                surface.notify(&e.to_string());
                Default::default()
            }
        };
        let theme_resolver = ThemeResolver::from_config(&config, store.dir());
        let theme = theme_resolver.resolve();
        info!(theme = %theme_resolver.path().display(), "config and theme loaded");

        Self {
            store,
            theme_resolver,
            ctx: SessionContext::new(config, theme),
            tabs: TabManager::new(),
            dispatcher: Dispatcher::default(),
            launcher,
            surface,
            sender,
            doc_watcher: None,
            theme_watcher: None,
            exit_requested: false,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn tabs(&self) -> &TabManager {
        &self.tabs
    }

    /// Start the theme watch, and the document watch when `auto_reload`
    /// is on. Failures degrade to no live updates.
    pub fn start_watchers(&mut self) {
        let tx = self.sender.clone();
        self.theme_watcher = match self.theme_resolver.watch(move |theme| {
            let _ = tx.send(AppEvent::ThemeChanged(theme));
        }) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!(error = %e, "theme watch unavailable");
                None
            }
        };

        self.doc_watcher = None;
        if !self.ctx.config.auto_reload {
            debug!("auto reload disabled");
            return;
        }
        let tx = self.sender.clone();
        match PathWatcher::spawn(DEBOUNCE_DELAY, move |event| {
            let event = match event {
                WatchEvent::Modified(path) => AppEvent::FileChanged(path),
                WatchEvent::Removed(path) => AppEvent::FileRemoved(path),
            };
            let _ = tx.send(event);
        }) {
            Ok(watcher) => {
                self.doc_watcher = Some(watcher);
                self.sync_watches();
            }
            Err(e) => {
                warn!(error = %e, "document watch unavailable");
                self.surface.notify(&format!("Live reload unavailable: {e}"));
            }
        }
    }

    /// Open the launch arguments, or show the empty state.
    pub fn startup(&mut self, paths: Vec<PathBuf>) {
        if paths.is_empty() {
            self.surface.show_empty();
        } else {
            self.open_paths(paths);
        }
    }

    /// Drain `events` until an exit is requested or every sender is gone.
    pub fn run(&mut self, events: Receiver<AppEvent>) {
        for event in events.iter() {
            if self.handle_event(event) == Flow::Exit {
                break;
            }
        }
        info!("event loop finished");
    }

    pub fn handle_event(&mut self, event: AppEvent) -> Flow {
        match event {
            AppEvent::Input(line) => self.handle_input(&line),
            AppEvent::Command(action) => Dispatcher::invoke(action, self),
            AppEvent::OpenRequested(paths) => self.open_paths(paths),
            AppEvent::FileChanged(path) => {
                if let Some(id) = self.tabs.mark_changed(&path) {
                    self.refresh_session(id);
                }
            }
            AppEvent::FileRemoved(path) => {
                if let Some(id) = self.tabs.mark_removed(&path)
                    && self.tabs.active_id() == Some(id)
                {
                    self.surface.notify(&format!("{} was removed", path.display()));
                    self.present_active();
                }
            }
            AppEvent::ThemeChanged(theme) => {
                info!(properties = theme.properties().count(), "theme changed");
                self.ctx.theme = theme;
                self.tabs.restyle_all(&self.ctx);
                self.present_active();
            }
            AppEvent::Rendered { ticket, body } => self.apply_render(ticket, body),
            AppEvent::InputClosed => {
                info!(open = self.tabs.count(), "input closed, still following file changes");
            }
        }

        if self.exit_requested {
            Flow::Exit
        } else {
            Flow::Continue
        }
    }

    fn handle_input(&mut self, line: &str) {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("open ") {
            let paths = split_arguments(rest).iter().map(|p| expand_home(p)).collect();
            self.open_paths(paths);
            return;
        }
        if line == "help" {
            self.show_bindings();
            return;
        }
        match self.dispatcher.resolve(line) {
            Some(action) => Dispatcher::invoke(action, self),
            None => debug!(input = line, "ignoring unbound input"),
        }
    }

    pub fn open_paths(&mut self, paths: Vec<PathBuf>) {
        let report = self.tabs.open_paths(&paths, &self.ctx);
        for (_, e) in &report.failures {
            self.surface.notify(&e.to_string());
        }
        self.sync_watches();
        self.present_active();
    }

    fn sync_watches(&mut self) {
        if let Some(watcher) = self.doc_watcher.as_mut() {
            watcher.sync_paths(self.tabs.paths());
        }
    }

    /// Re-read one session. Large documents render on a worker and land
    /// through [`AppEvent::Rendered`].
    fn refresh_session(&mut self, id: DocumentId) {
        let Some(session) = self.tabs.session_mut(id) else {
            return;
        };
        match session.reload_content() {
            Ok(Reload::Unchanged) => debug!(id = id.0, "content unchanged"),
            Ok(Reload::Missing) => {
                self.surface
                    .notify(&format!("{} is missing", session.path().display()));
            }
            Ok(Reload::Changed(ticket)) if ticket.content.len() > LARGE_DOCUMENT_BYTES => {
                self.spawn_render(ticket);
                return;
            }
            Ok(Reload::Changed(ticket)) => {
                let body = render_markdown(&ticket.content);
                session.complete_render(ticket, body, &self.ctx);
            }
            Err(e) => {
                warn!(id = id.0, error = %e, "refresh failed");
                self.surface.notify(&e.to_string());
            }
        }
        self.present_active();
    }

    fn spawn_render(&mut self, ticket: RenderTicket) {
        debug!(id = ticket.id.0, bytes = ticket.content.len(), "rendering on worker");
        let tx = self.sender.clone();
        let fallback = ticket.clone();
        let spawned = thread::Builder::new()
            .name("mdview-render".to_string())
            .spawn(move || {
                let body = render_markdown(&ticket.content);
                let _ = tx.send(AppEvent::Rendered { ticket, body });
            });
        if let Err(e) = spawned {
            warn!(error = %e, "cannot spawn render worker, rendering inline");
            let body = render_markdown(&fallback.content);
            self.apply_render(fallback, body);
        }
    }

    fn apply_render(&mut self, ticket: RenderTicket, body: String) {
        let id = ticket.id;
        let Some(session) = self.tabs.session_mut(id) else {
            debug!(id = id.0, "render finished for closed document");
            return;
        };
        if session.complete_render(ticket, body, &self.ctx) && self.tabs.active_id() == Some(id) {
            self.present_active();
        }
    }

    fn present_active(&mut self) {
        let Some(index) = self.tabs.active_index() else {
            self.surface.show_empty();
            return;
        };
        let count = self.tabs.count();
        let Some(session) = self.tabs.active() else {
            return;
        };
        let Some(output) = session.output() else {
            return;
        };

        let frame = Frame {
            id: session.id,
            title: session.title(),
            path: session.path().to_path_buf(),
            html: output.html.clone(),
            style: output.style.clone(),
            revision: session.revision(),
            index,
            count,
            stale: session.is_missing(),
        };
        if let Err(e) = self.surface.present(&frame) {
            error!(id = frame.id.0, error = %e, "cannot present document");
            self.surface.notify(&e.to_string());
        }
    }

    fn show_bindings(&mut self) {
        let keymap = self.dispatcher.keymap();
        let lines: Vec<String> = Action::ALL
            .into_iter()
            .map(|action| format!("{action}: {}", keymap.accelerators_for(action).join(", ")))
            .collect();
        for line in lines {
            self.surface.notify(&line);
        }
    }

    /// Remember the active zoom and the open files for the next start.
    fn persist_session(&mut self) {
        let zoom = self.tabs.active().map(|s| s.zoom());
        let files: Vec<PathBuf> = self.tabs.paths().map(|p| p.to_path_buf()).collect();
        if let Err(e) = self.store.save_session(zoom, &files) {
            warn!(error = %e, "cannot save session");
        }
    }

    fn launch(&mut self, request: LaunchRequest) {
        if let Err(e) = self.launcher.launch(&request) {
            warn!(error = %e, "launch failed");
            self.surface.notify(&e.to_string());
        }
    }

    fn open_dialog_directory(&self) -> PathBuf {
        let configured = self.ctx.config.default_directory.trim();
        if !configured.is_empty() {
            return expand_home(configured);
        }
        self.tabs
            .active()
            .and_then(|s| s.path().parent().map(|p| p.to_path_buf()))
            .or_else(|| std::env::current_dir().ok())
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl CommandTarget for App {
    fn open_file(&mut self) {
        let start_dir = self.open_dialog_directory();
        if let Some(paths) = self.surface.pick_files(&start_dir) {
            self.open_paths(paths);
        }
    }

    /// Closing the last tab ends the app; starting without files does not.
    fn close_tab(&mut self) {
        match self.tabs.close_active() {
            CloseOutcome::Closed(id) => {
                self.surface.forget(id);
                self.sync_watches();
                self.present_active();
            }
            CloseOutcome::Empty(id) => {
                self.surface.forget(id);
                self.sync_watches();
                self.surface.show_empty();
                info!("last document closed");
                self.persist_session();
                self.exit_requested = true;
            }
            CloseOutcome::NothingToClose => {}
        }
    }

    fn quit(&mut self) {
        info!("quit requested");
        self.persist_session();
        self.exit_requested = true;
    }

    fn zoom_in(&mut self) {
        if let Some(session) = self.tabs.active_mut() {
            session.zoom_in(&self.ctx);
            self.present_active();
        }
    }

    fn zoom_out(&mut self) {
        if let Some(session) = self.tabs.active_mut() {
            session.zoom_out(&self.ctx);
            self.present_active();
        }
    }

    fn zoom_reset(&mut self) {
        if let Some(session) = self.tabs.active_mut() {
            session.zoom_reset(&self.ctx);
            self.present_active();
        }
    }

    fn edit_external(&mut self) {
        let Some(session) = self.tabs.active() else {
            return;
        };
        if let Err(e) = session.edit(self.launcher.as_ref(), &self.ctx) {
            warn!(error = %e, "cannot start editor");
            self.surface.notify(&e.to_string());
        }
    }

    fn open_terminal(&mut self) {
        let dir = self.open_dialog_directory();
        let request = LaunchRequest::terminal(&self.ctx.config, Some(dir.as_path()));
        self.launch(request);
    }

    fn open_config(&mut self) {
        if let Err(e) = self.store.ensure_exists() {
            warn!(error = %e, "cannot create config file");
            self.surface.notify(&e.to_string());
            return;
        }
        let request = LaunchRequest::edit(&self.ctx.config, self.store.path());
        self.launch(request);
    }

    fn reload(&mut self) {
        if let Some(id) = self.tabs.active_id() {
            self.refresh_session(id);
        }
    }

    fn reload_config(&mut self) {
        let config = match self.store.load() {
            Ok(config) => config,
            Err(e) => {
                let e = AppError::Config(format!("reload failed, keeping current settings: {e}"));
                warn!(error = %e, "config reload failed");
                self.surface.notify(&e.to_string());
                return;
            }
        };

        let auto_reload_changed = config.auto_reload != self.ctx.config.auto_reload;
        self.theme_resolver = ThemeResolver::from_config(&config, self.store.dir());
        let theme_moved = self
            .theme_watcher
            .as_ref()
            .is_some_and(|w| !w.is_watching(self.theme_resolver.path()));

        self.ctx = SessionContext::new(config, self.theme_resolver.resolve());
        self.tabs.restyle_all(&self.ctx);
        info!(theme = %self.theme_resolver.path().display(), "config reloaded");

        let started = self.doc_watcher.is_some() || self.theme_watcher.is_some();
        if started && (auto_reload_changed || theme_moved) {
            self.start_watchers();
        }
        self.present_active();
    }

    fn next_tab(&mut self) {
        if self.tabs.next(&self.ctx) {
            self.present_active();
        }
    }

    fn previous_tab(&mut self) {
        if self.tabs.previous(&self.ctx) {
            self.present_active();
        }
    }
}
