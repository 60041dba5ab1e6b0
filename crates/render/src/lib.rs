//! rg-status-render: Built-in output renderers for rg-status.
//!
//! A renderer turns the ordered section snapshot into one line per
//! regeneration. Each section's cache slot holds the fragment rendered
//! for it last time, so only dirty sections are re-rendered.

mod debug;
mod json;
pub mod layout;
mod text;

pub use debug::DebugRenderer;
pub use json::{ClickParser, JsonRenderer, JSON_HEADER};
pub use text::TextRenderer;

use rg_status_core::PluginRegistry;

/// Register all built-in renderers
pub fn register_all(registry: &mut PluginRegistry) {
    registry.register_renderer("text", text::create);
    registry.register_renderer("json", json::create);
    registry.register_renderer("debug", debug::create);
}
