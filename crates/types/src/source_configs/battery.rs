//! Battery source configuration types.

use serde::{Deserialize, Serialize};

fn default_interval_secs() -> u64 {
    15
}

fn default_power_supply_dir() -> String {
    "/sys/class/power_supply".to_string()
}

fn default_urgent_below() -> u8 {
    10
}

/// Battery source configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatterySourceConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Root of the power supply class tree
    #[serde(default = "default_power_supply_dir")]
    pub power_supply_dir: String,
    /// Discharging below this capacity flags the section urgent
    #[serde(default = "default_urgent_below")]
    pub urgent_below: u8,
}

impl Default for BatterySourceConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            power_supply_dir: default_power_supply_dir(),
            urgent_below: default_urgent_below(),
        }
    }
}
