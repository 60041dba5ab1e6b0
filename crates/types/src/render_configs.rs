//! Output renderer configuration types.

use serde::{Deserialize, Serialize};

fn default_separator() -> String {
    " | ".to_string()
}

fn default_label_separator() -> String {
    ": ".to_string()
}

fn default_true() -> bool {
    true
}

/// Plain text renderer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextRendererConfig {
    /// Placed between sections
    #[serde(default = "default_separator")]
    pub separator: String,
    /// Placed between a label and its value
    #[serde(default = "default_label_separator")]
    pub label_separator: String,
    /// ANSI colours. Off by default: lines also travel over sockets to
    /// consumers that may not understand escapes.
    #[serde(default)]
    pub colour: bool,
}

impl Default for TextRendererConfig {
    fn default() -> Self {
        Self {
            separator: default_separator(),
            label_separator: default_label_separator(),
            colour: false,
        }
    }
}

/// i3bar / swaybar JSON renderer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRendererConfig {
    /// Ask the bar to draw a separator after each block
    #[serde(default = "default_true")]
    pub separator: bool,
    /// Derive a block colour from the section state when none is set
    #[serde(default = "default_true")]
    pub state_colours: bool,
}

impl Default for JsonRendererConfig {
    fn default() -> Self {
        Self {
            separator: true,
            state_colours: true,
        }
    }
}
