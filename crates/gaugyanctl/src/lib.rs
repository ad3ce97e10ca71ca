//! Gau Gyan Control library - exposes modules for testing.

pub mod client;
pub mod commands;
pub mod errors;
pub mod image_file;
pub mod scorecard;
pub mod session_file;
