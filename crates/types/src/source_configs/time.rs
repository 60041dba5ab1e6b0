//! Time source configuration types.

use serde::{Deserialize, Serialize};

fn default_format() -> String {
    "%a %d %b %H:%M".to_string()
}

fn default_format_alt() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

fn default_zones() -> Vec<String> {
    vec!["Local".to_string()]
}

/// Time source configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeSourceConfig {
    /// strftime-style format shown by default
    #[serde(default = "default_format")]
    pub format: String,
    /// Format toggled to by a primary click
    #[serde(default = "default_format_alt")]
    pub format_alt: String,
    /// Timezone IDs (e.g., "America/New_York", "Europe/London", "Local")
    #[serde(default = "default_zones")]
    pub zones: Vec<String>,
}

impl TimeSourceConfig {
    /// Whether either format needs a per-second tick
    pub fn needs_seconds(&self) -> bool {
        [&self.format, &self.format_alt]
            .iter()
            .any(|f| f.contains("%S") || f.contains("%T") || f.contains("%s"))
    }
}

impl Default for TimeSourceConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            format_alt: default_format_alt(),
            zones: default_zones(),
        }
    }
}
