use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::app::domain::config::Config;
use crate::app::domain::theme::Theme;
use crate::app::infrastructure::error::Result;
use crate::app::services::config_store::expand_home;
use crate::app::services::watcher::{DEBOUNCE_DELAY, PathWatcher};

/// Resolves the color theme from an externally generated stylesheet.
#[derive(Debug, Clone)]
pub struct ThemeResolver {
    path: PathBuf,
}

impl ThemeResolver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `custom_css_path` when set and present, otherwise the
    /// wallust-generated `style.css` in `config_dir`.
    pub fn from_config(config: &Config, config_dir: &Path) -> Self {
        if !config.custom_css_path.is_empty() {
            let custom = expand_home(&config.custom_css_path);
            if custom.exists() {
                return Self::new(custom);
            }
            warn!(path = %custom.display(), "custom stylesheet not found, using generated theme");
        }
        Self::new(Self::generated_path(config_dir))
    }

    pub fn generated_path(config_dir: &Path) -> PathBuf {
        config_dir.join("style.css")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stylesheet. Absence or an unreadable file is an empty theme.
    pub fn resolve(&self) -> Theme {
        match fs::read_to_string(&self.path) {
            Ok(css) => {
                let theme = Theme::from_css(&css);
                debug!(path = %self.path.display(), "theme resolved");
                theme
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Theme::empty(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read theme, using defaults");
                Theme::empty()
            }
        }
    }

    /// Watch the stylesheet and hand each debounced change to `on_change`
    /// as a freshly resolved theme. `on_change` runs on the watcher thread;
    /// forward it to the owning thread rather than mutating state there.
    ///
    /// A missing parent directory is created so a stylesheet generated
    /// later is still seen.
    pub fn watch<F>(&self, mut on_change: F) -> Result<PathWatcher>
    where
        F: FnMut(Theme) + Send + 'static,
    {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let resolver = self.clone();
        let mut watcher = PathWatcher::spawn(DEBOUNCE_DELAY, move |_| {
            info!(path = %resolver.path.display(), "theme file changed");
            on_change(resolver.resolve());
        })?;
        watcher.watch(&self.path)?;
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_missing_stylesheet_is_empty_theme() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let resolver = ThemeResolver::new(dir.path().join("style.css"));
        assert!(resolver.resolve().is_empty());
    }

    #[test]
    fn test_resolve_reads_roles() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = dir.path().join("style.css");
        fs::write(&path, ":root { --background: #0b0b0b; --color2: #00ff00; }").expect("write");

        let theme = ThemeResolver::new(&path).resolve();
        assert_eq!(theme.property("background"), Some("#0b0b0b"));
        assert_eq!(theme.property("color2"), Some("#00ff00"));
    }

    #[test]
    fn test_custom_path_takes_priority() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let custom = dir.path().join("mine.css");
        fs::write(&custom, "--accent: red;").expect("write");

        let config = Config {
            custom_css_path: custom.to_string_lossy().to_string(),
            ..Config::default()
        };
        assert_eq!(
            ThemeResolver::from_config(&config, dir.path()).path(),
            custom.as_path()
        );
    }

    #[test]
    fn test_missing_custom_path_falls_back_to_generated() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let config = Config {
            custom_css_path: "/definitely/not/here.css".to_string(),
            ..Config::default()
        };
        assert_eq!(
            ThemeResolver::from_config(&config, dir.path()).path(),
            dir.path().join("style.css")
        );
    }

    #[test]
    fn test_watch_before_config_dir_exists() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = dir.path().join("not-yet").join("style.css");
        let (tx, rx) = mpsc::channel();

        let watcher = ThemeResolver::new(&path)
            .watch(move |theme| {
                let _ = tx.send(theme);
            })
            .expect("watch");
        assert!(path.parent().expect("parent").is_dir());
        assert!(watcher.is_watching(&path));

        fs::write(&path, "--background: #101010;").expect("write generated theme");
        let theme = rx.recv_timeout(Duration::from_secs(5)).expect("theme change");
        assert_eq!(theme.property("background"), Some("#101010"));
    }
}
