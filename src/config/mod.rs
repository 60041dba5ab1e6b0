//! Configuration management

mod settings;

pub use settings::{AppConfig, CliOverrides, GeneralConfig, ReconnectConfig, CONFIG_ENV};
