use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::app::domain::config::Config;
use crate::app::infrastructure::error::{AppError, Result};

/// Reads the user config file. Missing or unparsable files degrade to
/// defaults; only a filesystem failure other than "not found" is an error.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform config location.
    pub fn at_default_location() -> Self {
        Self::new(Self::default_path())
    }

    /// Get config file path (cross-platform)
    pub fn default_path() -> PathBuf {
        config_root().join("config.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the config file; the generated theme lives here too.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn load(&self) -> Result<Config> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no config file, using defaults");
                return Ok(Config::default());
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!(path = %self.path.display(), error = %e, "config is not valid UTF-8, using defaults");
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(AppError::Config(format!(
                    "cannot read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let value: serde_json::Value = match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to parse config, using defaults");
                return Ok(Config::default());
            }
        };

        let (config, rejected) = Config::from_json(&value);
        if !rejected.is_empty() {
            warn!(
                path = %self.path.display(),
                rejected = rejected.len(),
                "some config values were invalid and fell back to defaults"
            );
        }
        Ok(config)
    }

    /// Write a default config file if none exists yet, so there is
    /// something to open in an editor.
    pub fn ensure_exists(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }

        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&Config::default())?;
        fs::write(&self.path, json)?;
        info!(path = %self.path.display(), "wrote default config");
        Ok(())
    }

    /// Record the zoom and open files on exit. Other keys in the file,
    /// including ones this version does not know, are kept as written.
    pub fn save_session(&self, zoom_level: Option<f64>, open_files: &[PathBuf]) -> Result<()> {
        let mut obj = match fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str::<serde_json::Value>(&contents) {
                Ok(serde_json::Value::Object(obj)) => obj,
                _ => {
                    warn!(path = %self.path.display(), "config is not a JSON object, not saving session");
                    return Ok(());
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                match serde_json::to_value(Config::default())? {
                    serde_json::Value::Object(obj) => obj,
                    _ => serde_json::Map::new(),
                }
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(zoom) = zoom_level {
            obj.insert("zoom_level".to_string(), serde_json::Value::from(zoom));
        }
        let files: Vec<serde_json::Value> = open_files
            .iter()
            .map(|p| serde_json::Value::from(p.to_string_lossy().into_owned()))
            .collect();
        obj.insert("last_files".to_string(), serde_json::Value::Array(files));

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&serde_json::Value::Object(obj))?;
        fs::write(&self.path, json)?;
        info!(path = %self.path.display(), files = open_files.len(), "session saved");
        Ok(())
    }
}

/// `<config_dir>/mdview`, falling back to the working directory.
pub fn config_root() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("mdview");
    path
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
