//! Gau Gyan daemon library - exposes modules for testing.

pub mod config;
pub mod db;
pub mod flows;
pub mod gate;
pub mod history;
pub mod identity;
pub mod model;
pub mod network;
pub mod prompts;
pub mod routes;
pub mod server;
