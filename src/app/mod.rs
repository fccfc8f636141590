//! Application layer - organized by Clean Architecture principles.
//!
//! # Structure
//!
//! - `domain/` - Core data structures (Config, Theme, DocumentSession, AppEvent)
//! - `controllers/` - Orchestration (TabManager, command dispatch)
//! - `services/` - Business operations (config store, theme resolver, renderer, watcher)
//! - `infrastructure/` - External integrations (errors, process launching, logging)
//! - `state.rs` - Main application coordinator

pub mod controllers;
pub mod domain;
pub mod infrastructure;
pub mod services;
pub mod state;

// Re-exports for convenient external access
pub use controllers::commands::{Action, Dispatcher, Keymap};
pub use controllers::tabs::TabManager;
pub use domain::{AppEvent, Config, DocumentId, DocumentSession, SessionContext, Theme, ThemeRole};
pub use infrastructure::error::{AppError, Result};
pub use state::{App, Flow};
