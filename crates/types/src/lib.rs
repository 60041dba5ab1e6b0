//! rg-status-types: Shared data types for the rg-status status line generator.
//!
//! This crate contains pure data types (colours, section attributes,
//! override rules, input plugin and renderer configs) that are shared across all
//! rg-status crates. Nothing in here touches the event loop.

pub mod color;
pub mod render_configs;
pub mod section;
pub mod source_configs;

// Re-export commonly used types at the crate root for convenience
pub use color::{Color, ColorParseError};
pub use render_configs::{JsonRendererConfig, TextRendererConfig};
pub use section::{Align, SectionOverride, State};
pub use source_configs::{
    BatterySourceConfig, CommandSourceConfig, NetworkField, NetworkSourceConfig, SensorsSourceConfig,
    TimeSourceConfig,
};
