//! Plugin traits and the name-keyed plugin registry

use crate::action::ActionEvent;
use crate::context::Core;
use crate::error::ActionParseError;
use crate::section::Section;
use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// Trait for all input plugins
///
/// An input plugin is created by its factory (which inserts its initial
/// sections), then started and stopped as the aggregator resumes and
/// pauses. All mutation must happen on the event-loop thread.
pub trait InputPlugin {
    /// Name the plugin was registered under
    fn name(&self) -> &str;

    /// Resume producing data
    fn start(&mut self) {}

    /// Pause producing data (cancel timers, subscriptions)
    fn stop(&mut self) {}

    /// Release everything before the process exits
    fn uninit(&mut self) {}
}

/// Trait for all output renderers
///
/// A renderer turns the ordered section snapshot into one line for the
/// delivery manager.
pub trait Renderer {
    /// Name the renderer was registered under
    fn name(&self) -> &'static str;

    /// One-time preamble sent to each stream before its first line
    fn header(&self) -> Option<String> {
        None
    }

    /// Render the ordered snapshot. Only each section's cache may be
    /// touched. An empty snapshot must still give a valid line.
    fn render(&mut self, sections: &mut [&mut Section]) -> String;

    /// Parser for inbound action lines, for protocols that have them
    fn action_parser(&self) -> Option<Rc<dyn ActionParser>> {
        None
    }

    /// Release everything before the process exits
    fn uninit(&mut self) {}
}

/// Parses one inbound line into an action
pub trait ActionParser {
    /// `Ok(None)` for lines that carry no action (protocol framing)
    fn parse(&self, line: &str) -> Result<Option<ActionEvent>, ActionParseError>;
}

/// Function that creates an input plugin; it receives its config object
pub type InputFactory = fn(&Core, &Value) -> Result<Box<dyn InputPlugin>>;

/// Function that creates a renderer; it receives its config object
pub type RendererFactory = fn(&Value) -> Result<Box<dyn Renderer>>;

/// Deserialize a plugin's own config object; a missing object means
/// defaults
pub fn plugin_config<T>(value: &Value) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if value.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(value.clone())?)
}

/// Registry for input plugins and renderers
///
/// This allows for compile-time registration of built-in plugins.
pub struct PluginRegistry {
    inputs: HashMap<String, InputFactory>,
    renderers: HashMap<String, RendererFactory>,
}

impl PluginRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            inputs: HashMap::new(),
            renderers: HashMap::new(),
        }
    }

    /// Register an input plugin
    pub fn register_input(&mut self, name: &str, factory: InputFactory) {
        self.inputs.insert(name.to_string(), factory);
    }

    /// Register a renderer
    pub fn register_renderer(&mut self, name: &str, factory: RendererFactory) {
        self.renderers.insert(name.to_string(), factory);
    }

    /// Create an input plugin by name
    pub fn create_input(
        &self,
        name: &str,
        core: &Core,
        config: &Value,
    ) -> Result<Box<dyn InputPlugin>> {
        let factory = self
            .inputs
            .get(name)
            .ok_or_else(|| anyhow!("Unknown input plugin: {}", name))?;
        factory(core, config)
    }

    /// Create a renderer by name
    pub fn create_renderer(&self, name: &str, config: &Value) -> Result<Box<dyn Renderer>> {
        let factory = self
            .renderers
            .get(name)
            .ok_or_else(|| anyhow!("Unknown output renderer: {}", name))?;
        factory(config)
    }

    /// List all registered input names, sorted
    pub fn list_inputs(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inputs.keys().cloned().collect();
        names.sort();
        names
    }

    /// List all registered renderer names, sorted
    pub fn list_renderers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.renderers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
