//! Daemon configuration

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use rg_status_core::{ReconnectPolicy, SectionOverride};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "RG_STATUS_CONFIG";

/// Application-wide configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    /// Per-section overrides keyed by id or bare name
    #[serde(default)]
    pub overrides: HashMap<String, SectionOverride>,
    /// Everything else: one object per plugin, keyed by plugin name
    #[serde(flatten)]
    pub plugins: Map<String, Value>,
}

/// The `general` group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Output renderer name
    pub output: String,
    /// Input plugin names, in start order
    pub inputs: Vec<String>,
    /// Explicit display order of section ids or names
    pub order: Vec<String>,
    /// Addresses to listen on
    pub listen: Vec<String>,
    /// Client stream addresses
    pub streams: Vec<String>,
    pub reconnect: ReconnectConfig,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: "text".to_string(),
            inputs: Vec::new(),
            order: Vec::new(),
            listen: Vec::new(),
            streams: Vec::new(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReconnectConfig {
    pub max_attempts: u8,
    pub delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            delay_ms: u64::try_from(policy.delay.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl ReconnectConfig {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_attempts.max(1),
            delay: Duration::from_millis(self.delay_ms),
        }
    }
}

impl AppConfig {
    /// Load configuration from the explicit path, `RG_STATUS_CONFIG`, or
    /// the default location, in that order of preference.
    ///
    /// Only the default location may be missing; that yields defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return Self::load_from_path(Path::new(&path));
        }

        let config_path = Self::config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("com", "github.rg_status", "rg-status")
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(dirs.config_dir().join("config.json"))
    }

    /// Load configuration from a specific file path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Settings object for one plugin; `Null` when the group is absent
    pub fn plugin(&self, name: &str) -> Value {
        self.plugins.get(name).cloned().unwrap_or(Value::Null)
    }

    /// Append command line values to the configured lists
    pub fn extend(&mut self, overrides: CliOverrides) {
        if let Some(output) = overrides.output {
            self.general.output = output;
        }
        self.general.inputs.extend(overrides.inputs);
        self.general.order.extend(overrides.order);
        self.general.listen.extend(overrides.listen);
        self.general.streams.extend(overrides.streams);
    }

    /// Inputs to create, never empty
    pub fn inputs(&self) -> Vec<String> {
        if self.general.inputs.is_empty() {
            vec!["time".to_string()]
        } else {
            dedup(&self.general.inputs)
        }
    }

    /// Streams to open; stdio when nothing else would carry output
    pub fn streams(&self) -> Vec<String> {
        if self.general.streams.is_empty() && self.general.listen.is_empty() {
            vec!["std".to_string()]
        } else {
            dedup(&self.general.streams)
        }
    }
}

/// Keep the first occurrence of every entry
fn dedup(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(value) {
            out.push(value.clone());
        }
    }
    out
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub output: Option<String>,
    pub inputs: Vec<String>,
    pub order: Vec<String>,
    pub listen: Vec<String>,
    pub streams: Vec<String>,
}
