//! Controllers layer - orchestration and coordination.
//!
//! - Tab management
//! - Command routing (accelerators, action names)

pub mod commands;
pub mod tabs;
