use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::{self, Sender};
use std::thread;

use clap::Parser;
use tracing::{error, info, warn};

use mdview::app::domain::messages::AppEvent;
use mdview::app::infrastructure::launcher::{LaunchRequest, ProcessLauncher, SystemLauncher};
use mdview::app::infrastructure::logging;
use mdview::app::services::config_store::ConfigStore;
use mdview::app::state::App;
use mdview::ui::preview_surface::PreviewSurface;

#[derive(Parser)]
#[command(
    name = "mdview",
    version,
    about = "Markdown viewer with tabs, live reload and wallust theming",
    after_help = "While running, type accelerators such as <Ctrl>w or ctrl+plus, \
                  action names such as zoom-in, `open PATH...`, or help."
)]
struct Args {
    /// Markdown files to open
    files: Vec<PathBuf>,

    /// Open the config file in the configured editor and exit
    #[arg(short, long)]
    config: bool,

    /// Use this config file instead of the default location
    #[arg(long, value_name = "PATH")]
    config_path: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init();

    let store = match args.config_path {
        Some(path) => ConfigStore::new(path),
        None => ConfigStore::at_default_location(),
    };

    if args.config {
        return edit_config(&store);
    }

    let surface = match PreviewSurface::stdout() {
        Ok(surface) => surface,
        Err(e) => {
            error!(error = %e, "cannot prepare preview directory");
            eprintln!("mdview: {e}");
            return ExitCode::FAILURE;
        }
    };

    let (tx, rx) = mpsc::channel();
    let mut app = App::new(store, Box::new(SystemLauncher), Box::new(surface), tx.clone());
    app.start_watchers();
    app.startup(args.files);

    spawn_input_reader(tx);
    app.run(rx);
    ExitCode::SUCCESS
}

/// `--config`: make sure the file exists, hand it to the editor, exit.
fn edit_config(store: &ConfigStore) -> ExitCode {
    let result = store.ensure_exists().and_then(|_| {
        let config = store.load()?;
        SystemLauncher.launch(&LaunchRequest::edit(&config, store.path()))
    });
    match result {
        Ok(()) => {
            info!(path = %store.path().display(), "config opened in editor");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "cannot open config");
            eprintln!("mdview: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Forward stdin lines to the event loop as input gestures.
fn spawn_input_reader(tx: Sender<AppEvent>) {
    let spawned = thread::Builder::new()
        .name("mdview-input".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let event = match line {
                    Ok(line) if line.trim().is_empty() => continue,
                    Ok(line) => AppEvent::Input(line),
                    Err(e) => {
                        warn!(error = %e, "input stream failed");
                        break;
                    }
                };
                if tx.send(event).is_err() {
                    return;
                }
            }
            let _ = tx.send(AppEvent::InputClosed);
        });
    if let Err(e) = spawned {
        error!(error = %e, "cannot read input; only file events will be handled");
    }
}
