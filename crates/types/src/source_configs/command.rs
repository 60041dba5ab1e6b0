//! Command source configuration types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_shell() -> String {
    "/bin/sh".to_string()
}

/// Command source configuration
///
/// Each entry maps a section instance to a shell command whose stdout
/// lines become the section value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandSourceConfig {
    #[serde(default = "default_shell")]
    pub shell: String,
    #[serde(default)]
    pub commands: BTreeMap<String, String>,
}

impl Default for CommandSourceConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            commands: BTreeMap::new(),
        }
    }
}
