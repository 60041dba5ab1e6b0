//! Debug renderer: a multi-line dump of every section

use anyhow::Result;
use rg_status_core::{constants::UNLISTED_WEIGHT, Renderer, Section};
use serde_json::Value;
use std::fmt::Write;

#[derive(Debug, Default)]
pub struct DebugRenderer;

pub(crate) fn create(_config: &Value) -> Result<Box<dyn Renderer>> {
    Ok(Box::new(DebugRenderer))
}

fn describe(section: &Section) -> String {
    let weight = if section.weight() == UNLISTED_WEIGHT {
        "-".to_string()
    } else {
        section.weight().to_string()
    };
    let mut out = format!(
        "{} weight={} state={} urgent={}",
        section.id(),
        weight,
        section.state().as_str(),
        section.is_urgent()
    );
    if let Some(label) = section.label() {
        let _ = write!(out, " label={:?}", label);
    }
    match section.value() {
        Some(value) => {
            let _ = write!(out, " value={:?}", value);
        }
        None => out.push_str(" value=-"),
    }
    out
}

impl Renderer for DebugRenderer {
    fn name(&self) -> &'static str {
        "debug"
    }

    fn render(&mut self, sections: &mut [&mut Section]) -> String {
        // Every line ends in a newline, the stream adds the blank one
        let mut out = String::new();
        for section in sections.iter_mut() {
            if section.is_dirty() || section.cache().is_none() {
                let line = describe(section);
                section.store_cache(line);
            }
            if let Some(line) = section.cache() {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}
