//! Domain layer - core data structures and types.
//!
//! This module contains the fundamental domain models:
//! - Configuration and theme
//! - Document sessions and their ids
//! - Event types for the control loop

pub mod config;
pub mod context;
pub mod document;
pub mod messages;
pub mod theme;

pub use config::Config;
pub use context::SessionContext;
pub use document::{DocumentId, DocumentSession};
pub use messages::AppEvent;
pub use theme::{Theme, ThemeRole};
