//! Network source configuration types.

use serde::{Deserialize, Serialize};

/// What a network section shows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum NetworkField {
    #[serde(rename = "rate")]
    #[default]
    Rate,
    #[serde(rename = "total")]
    Total,
}

fn default_interval_secs() -> u64 {
    2
}

/// Network source configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSourceConfig {
    /// Interfaces to show; empty shows every non-loopback interface
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub field: NetworkField,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for NetworkSourceConfig {
    fn default() -> Self {
        Self {
            interfaces: Vec::new(),
            field: NetworkField::Rate,
            interval_secs: default_interval_secs(),
        }
    }
}
