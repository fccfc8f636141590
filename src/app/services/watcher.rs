use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::app::infrastructure::error::Result;

/// Quiet period a path must stay untouched before its change is reported.
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(150);

const WATCHER_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Modified(PathBuf),
    Removed(PathBuf),
}

/// Collapses bursts of triggers per key into one, released once the key
/// has been quiet for `delay`.
pub struct Debouncer<K> {
    delay: Duration,
    pending: HashMap<K, Instant>,
}

impl<K: Eq + Hash + Clone + Ord> Debouncer<K> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
        }
    }

    pub fn queue(&mut self, key: K, now: Instant) {
        self.pending.insert(key, now);
    }

    pub fn cancel(&mut self, key: &K) {
        self.pending.remove(key);
    }

    /// Keys whose quiet period has elapsed, in sorted order.
    pub fn take_ready(&mut self, now: Instant) -> Vec<K> {
        let mut ready: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, queued_at)| now.saturating_duration_since(**queued_at) >= self.delay)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &ready {
            self.pending.remove(key);
        }
        ready.sort();
        ready
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().map(|queued_at| *queued_at + self.delay)
    }

    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FileFingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

fn file_fingerprint(path: &Path) -> Option<FileFingerprint> {
    let metadata = std::fs::metadata(path).ok()?;
    if !metadata.is_file() {
        return None;
    }

    Some(FileFingerprint {
        len: metadata.len(),
        modified: metadata.modified().ok(),
    })
}

/// Stable identity for a path that may not exist yet: canonical if
/// possible, otherwise canonical parent joined with the file name.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

enum Incoming {
    Raw(notify::Event),
    Track(PathBuf, Option<FileFingerprint>),
    Untrack(PathBuf),
}

/// Watches individual files through their parent directories, so atomic
/// replace-by-rename saves and not-yet-created files are both seen.
///
/// Raw notifications are filtered and debounced on a background thread;
/// `on_event` runs there and must only forward (e.g. into a channel).
pub struct PathWatcher {
    watcher: RecommendedWatcher,
    control_tx: Sender<Incoming>,
    dir_refs: HashMap<PathBuf, usize>,
    tracked: HashSet<PathBuf>,
}

impl PathWatcher {
    pub fn spawn<F>(delay: Duration, on_event: F) -> Result<Self>
    where
        F: FnMut(WatchEvent) + Send + 'static,
    {
        let (control_tx, control_rx) = mpsc::channel();
        let raw_tx = control_tx.clone();
        let watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    let _ = raw_tx.send(Incoming::Raw(event));
                }
                Err(e) => warn!(error = %e, "file watch error"),
            },
            Config::default().with_poll_interval(WATCHER_POLL_INTERVAL),
        )?;

        thread::Builder::new()
            .name("mdview-watch".to_string())
            .spawn(move || run_debounce_loop(control_rx, delay, on_event))?;

        Ok(Self {
            watcher,
            control_tx,
            dir_refs: HashMap::new(),
            tracked: HashSet::new(),
        })
    }

    pub fn watch(&mut self, path: &Path) -> Result<()> {
        let key = normalize_path(path);
        if self.tracked.contains(&key) {
            return Ok(());
        }

        let dir = key.parent().map(Path::to_path_buf).unwrap_or_else(|| key.clone());
        let refs = self.dir_refs.entry(dir.clone()).or_insert(0);
        if *refs == 0 {
            if let Err(e) = self.watcher.watch(&dir, RecursiveMode::NonRecursive) {
                self.dir_refs.remove(&dir);
                return Err(e.into());
            }
            debug!(dir = %dir.display(), "watching directory");
        }
        *self.dir_refs.entry(dir).or_insert(0) += 1;

        self.tracked.insert(key.clone());
        let fingerprint = file_fingerprint(&key);
        let _ = self.control_tx.send(Incoming::Track(key, fingerprint));
        Ok(())
    }

    pub fn unwatch(&mut self, path: &Path) {
        let key = normalize_path(path);
        if !self.tracked.remove(&key) {
            return;
        }
        let _ = self.control_tx.send(Incoming::Untrack(key.clone()));

        let Some(dir) = key.parent().map(Path::to_path_buf) else {
            return;
        };
        if let Some(refs) = self.dir_refs.get_mut(&dir) {
            *refs -= 1;
            if *refs == 0 {
                self.dir_refs.remove(&dir);
                let _ = self.watcher.unwatch(&dir);
                debug!(dir = %dir.display(), "stopped watching directory");
            }
        }
    }

    /// Make the watched set exactly `paths`.
    pub fn sync_paths<'a, I>(&mut self, paths: I)
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let wanted: HashSet<PathBuf> = paths.into_iter().map(normalize_path).collect();
        let stale: Vec<PathBuf> = self.tracked.difference(&wanted).cloned().collect();
        for path in stale {
            self.unwatch(&path);
        }
        for path in wanted {
            if let Err(e) = self.watch(&path) {
                warn!(path = %path.display(), error = %e, "cannot watch file");
            }
        }
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.tracked.contains(&normalize_path(path))
    }
}

fn run_debounce_loop<F>(rx: Receiver<Incoming>, delay: Duration, mut on_event: F)
where
    F: FnMut(WatchEvent),
{
    let mut tracked: HashMap<PathBuf, Option<FileFingerprint>> = HashMap::new();
    let mut debouncer = Debouncer::new(delay);

    loop {
        let incoming = match debouncer.next_deadline() {
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                match rx.recv_timeout(wait) {
                    Ok(msg) => Some(msg),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(msg) => Some(msg),
                Err(_) => break,
            },
        };

        match incoming {
            Some(Incoming::Track(path, fingerprint)) => {
                tracked.insert(path, fingerprint);
            }
            Some(Incoming::Untrack(path)) => {
                tracked.remove(&path);
                debouncer.cancel(&path);
            }
            Some(Incoming::Raw(event)) => {
                if !matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
                ) {
                    continue;
                }
                let now = Instant::now();
                for path in &event.paths {
                    let key = normalize_path(path);
                    if tracked.contains_key(&key) {
                        debouncer.queue(key, now);
                    }
                }
            }
            None => {}
        }

        for path in debouncer.take_ready(Instant::now()) {
            let Some(previous) = tracked.get_mut(&path) else {
                continue;
            };
            let current = file_fingerprint(&path);
            if current == *previous {
                continue;
            }
            let removed = current.is_none();
            *previous = current;

            if removed {
                on_event(WatchEvent::Removed(path));
            } else {
                on_event(WatchEvent::Modified(path));
            }
        }
    }

    debug!("watch loop finished");
}
