//! i3bar / swaybar JSON renderer
//!
//! Output is the bar's endless array: a header object, `[`, then one
//! `[{block},...],` array per line. Click events come back on the same
//! stream as an endless array of objects.

use crate::layout::{state_colour, truncate};
use anyhow::Result;
use rg_status_core::{
    plugin_config, ActionEvent, ActionParseError, ActionParser, Renderer, Section,
};
use rg_status_types::JsonRendererConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::rc::Rc;

/// Protocol header; click events are always requested
pub const JSON_HEADER: &str = "{\"version\":1,\"click_events\":true}";

const LABEL_SEPARATOR: &str = ": ";

#[derive(Debug, Serialize)]
struct Block<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instance: Option<&'a str>,
    full_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    short_text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    align: Option<&'static str>,
    /// A string the bar measures to size the block
    #[serde(skip_serializing_if = "Option::is_none")]
    min_width: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    urgent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    separator: Option<bool>,
}

pub struct JsonRenderer {
    config: JsonRendererConfig,
}

pub(crate) fn create(config: &Value) -> Result<Box<dyn Renderer>> {
    let config: JsonRendererConfig = plugin_config(config)?;
    Ok(Box::new(JsonRenderer::new(config)))
}

impl JsonRenderer {
    pub fn new(config: JsonRendererConfig) -> Self {
        Self { config }
    }

    fn block(&self, section: &Section, value: &str) -> String {
        let max_width = section.max_width();
        let mut full_text = match section.label() {
            Some(label) => format!("{}{}{}", label, LABEL_SEPARATOR, value),
            None => value.to_string(),
        };
        let mut min_width = None;
        let mut align = None;
        if max_width != 0 {
            let limit = usize::try_from(max_width.unsigned_abs()).unwrap_or(usize::MAX);
            full_text = truncate(&full_text, limit);
            if max_width > 0 {
                // The bar pads; we only tell it how wide and which side
                min_width = Some("0".repeat(limit));
                align = Some(section.align().as_str());
            }
        }

        let colour = section.colour().or_else(|| {
            if self.config.state_colours {
                state_colour(section.state())
            } else {
                None
            }
        });

        let block = Block {
            name: section.name(),
            instance: section.instance(),
            full_text,
            short_text: section.short_value(),
            color: colour.map(|c| c.to_hex()),
            background: section.background_colour().map(|c| c.to_hex()),
            align,
            min_width,
            urgent: section.is_urgent(),
            separator: if self.config.separator { None } else { Some(false) },
        };
        // Only strings, bools and options: cannot fail
        serde_json::to_string(&block).unwrap_or_default()
    }
}

impl Renderer for JsonRenderer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn header(&self) -> Option<String> {
        Some(format!("{}\n[", JSON_HEADER))
    }

    fn render(&mut self, sections: &mut [&mut Section]) -> String {
        let mut blocks: Vec<String> = Vec::with_capacity(sections.len());
        for section in sections.iter_mut() {
            let Some(value) = section.value().map(str::to_string) else {
                continue;
            };
            if section.is_dirty() || section.cache().is_none() {
                let block = self.block(section, &value);
                section.store_cache(block);
            }
            if let Some(block) = section.cache() {
                blocks.push(block.to_string());
            }
        }
        format!("[{}],", blocks.join(","))
    }

    fn action_parser(&self) -> Option<Rc<dyn ActionParser>> {
        Some(Rc::new(ClickParser))
    }
}

#[derive(Debug, Deserialize)]
struct ClickEvent {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    instance: Option<String>,
    #[serde(default)]
    button: u32,
}

/// Parses the bar's click events into actions
#[derive(Debug, Default, Clone, Copy)]
pub struct ClickParser;

impl ActionParser for ClickParser {
    fn parse(&self, line: &str) -> Result<Option<ActionEvent>, ActionParseError> {
        let line = line.trim();
        let line = line.strip_prefix('[').unwrap_or(line).trim_start();
        let line = line.strip_prefix(',').unwrap_or(line).trim();
        if line.is_empty() {
            return Ok(None);
        }
        let event: ClickEvent = serde_json::from_str(line)?;
        let name = match event.name {
            Some(name) if !name.is_empty() => name,
            _ => return Err(ActionParseError::MissingName),
        };
        let section_id = match event.instance {
            Some(instance) if !instance.is_empty() => format!("{}:{}", name, instance),
            _ => name,
        };
        Ok(Some(ActionEvent::new(
            section_id,
            format!("mouse:{}", event.button),
        )))
    }
}
