//! mdview: a tabbed markdown viewer.
//!
//! Documents are rendered to themed HTML, watched for external edits and
//! handed to a display surface. All state lives on one control thread.

pub mod app;
pub mod ui;
