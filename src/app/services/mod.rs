//! Services layer - business operations and utilities.
//!
//! - Config persistence
//! - Theme resolution
//! - Markdown rendering
//! - File watching

pub mod config_store;
pub mod renderer;
pub mod theme_resolver;
pub mod watcher;
