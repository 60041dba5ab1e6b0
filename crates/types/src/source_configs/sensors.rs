//! Temperature sensor source configuration types.

use serde::{Deserialize, Serialize};

fn default_interval_secs() -> u64 {
    5
}

fn default_high() -> f32 {
    70.0
}

fn default_critical() -> f32 {
    90.0
}

/// Sensors source configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorsSourceConfig {
    /// Component labels to show; empty shows all
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Temperature (°C) at which a sensor turns Average
    #[serde(default = "default_high")]
    pub high: f32,
    /// Temperature (°C) at which a sensor turns Bad and urgent
    #[serde(default = "default_critical")]
    pub critical: f32,
}

impl Default for SensorsSourceConfig {
    fn default() -> Self {
        Self {
            components: Vec::new(),
            interval_secs: default_interval_secs(),
            high: default_high(),
            critical: default_critical(),
        }
    }
}
