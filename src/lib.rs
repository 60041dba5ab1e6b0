//! rg-status: a status line generator
//!
//! Input plugins feed named sections, a renderer turns the ordered
//! sections into one line, and the line is pushed to every connected
//! consumer. This crate holds the configuration layer and the daemon
//! wiring around the engine in `rg-status-core`.

pub mod config;
pub mod daemon;

// Re-export commonly used types
pub use config::AppConfig;
pub use daemon::{Daemon, StartupError};
