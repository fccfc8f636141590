use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use tracing::{debug, info};

use crate::app::domain::config::Config;
use crate::app::infrastructure::error::{AppError, Result};

/// A fire-and-forget request to start an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchRequest {
    /// Open `path` in `editor`, inside `terminal` when one is configured.
    Editor {
        editor: String,
        terminal: Option<String>,
        path: PathBuf,
    },
    /// A bare terminal, started in `dir` when given.
    Terminal {
        terminal: String,
        dir: Option<PathBuf>,
    },
}

impl LaunchRequest {
    pub fn edit(config: &Config, path: &Path) -> Self {
        let terminal = Some(config.terminal.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        Self::Editor {
            editor: config.editor.clone(),
            terminal,
            path: path.to_path_buf(),
        }
    }

    pub fn terminal(config: &Config, dir: Option<&Path>) -> Self {
        Self::Terminal {
            terminal: config.terminal.clone(),
            dir: dir.map(Path::to_path_buf),
        }
    }

    pub fn working_dir(&self) -> Option<&Path> {
        match self {
            LaunchRequest::Terminal { dir, .. } => dir.as_deref(),
            LaunchRequest::Editor { .. } => None,
        }
    }

    /// Program and arguments. Commands are split on whitespace.
    pub fn argv(&self) -> Vec<OsString> {
        let mut argv: Vec<OsString> = Vec::new();
        match self {
            LaunchRequest::Editor {
                editor,
                terminal,
                path,
            } => {
                if let Some(terminal) = terminal {
                    argv.extend(terminal.split_whitespace().map(OsString::from));
                    argv.push(OsString::from("-e"));
                }
                argv.extend(editor.split_whitespace().map(OsString::from));
                argv.push(path.as_os_str().to_os_string());
            }
            LaunchRequest::Terminal { terminal, .. } => {
                argv.extend(terminal.split_whitespace().map(OsString::from));
            }
        }
        argv
    }

    fn display(&self) -> String {
        self.argv()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Starts external processes without waiting on them.
pub trait ProcessLauncher {
    fn launch(&self, request: &LaunchRequest) -> Result<()>;
}

/// Spawns through `std::process`, detached from our stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn launch(&self, request: &LaunchRequest) -> Result<()> {
        let argv = request.argv();
        let command = request.display();
        let Some((program, args)) = argv.split_first() else {
            return Err(AppError::Launch {
                command,
                source: std::io::Error::new(ErrorKind::InvalidInput, "empty command"),
            });
        };

        let mut command_builder = Command::new(program);
        if let Some(dir) = request.working_dir() {
            command_builder.current_dir(dir);
        }
        let mut child = command_builder
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| AppError::Launch {
                command: command.clone(),
                source,
            })?;

        info!(%command, pid = child.id(), "launched external process");

        // Reap in the background; the exit status is not our concern.
        let _ = thread::Builder::new()
            .name("mdview-reaper".to_string())
            .spawn(move || {
                let status = child.wait();
                debug!(?status, "external process exited");
            });
        Ok(())
    }
}
