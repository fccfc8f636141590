//! Infrastructure layer - external integrations and utilities.
//!
//! - Error types
//! - External process launching
//! - Logging setup

pub mod error;
pub mod launcher;
pub mod logging;
