//! Plain text renderer: `label: value | label: value`

use crate::layout::{fit, state_colour};
use anyhow::Result;
use log::debug;
use owo_colors::OwoColorize;
use rg_status_core::{plugin_config, Renderer, Section};
use rg_status_types::{Color, TextRendererConfig};
use serde_json::Value;

pub struct TextRenderer {
    separator: String,
    label_separator: String,
    colour: bool,
}

pub(crate) fn create(config: &Value) -> Result<Box<dyn Renderer>> {
    let config: TextRendererConfig = plugin_config(config)?;
    Ok(Box::new(TextRenderer::new(config)))
}

fn paint(text: &str, fg: Option<Color>, bg: Option<Color>, bold: bool) -> String {
    let mut out = text.to_string();
    if let Some(colour) = fg {
        let (r, g, b, _) = colour.to_rgba8();
        out = out.truecolor(r, g, b).to_string();
    }
    if let Some(colour) = bg {
        let (r, g, b, _) = colour.to_rgba8();
        out = out.on_truecolor(r, g, b).to_string();
    }
    if bold {
        out = out.bold().to_string();
    }
    out
}

impl TextRenderer {
    pub fn new(config: TextRendererConfig) -> Self {
        let colour = config.colour;
        debug!("Text renderer colours {}", if colour { "on" } else { "off" });
        Self {
            separator: config.separator,
            label_separator: config.label_separator,
            colour,
        }
    }

    fn fragment(&self, section: &Section, value: &str) -> String {
        let value = fit(value, section.max_width(), section.align());
        if !self.colour {
            return match section.label() {
                Some(label) => format!("{}{}{}", label, self.label_separator, value),
                None => value,
            };
        }

        let fg = section.colour().or_else(|| state_colour(section.state()));
        let value = paint(&value, fg, section.background_colour(), section.is_urgent());
        match section.label() {
            Some(label) => format!(
                "{}{}{}",
                paint(label, section.label_colour(), None, false),
                self.label_separator,
                value
            ),
            None => value,
        }
    }
}

impl Renderer for TextRenderer {
    fn name(&self) -> &'static str {
        "text"
    }

    fn render(&mut self, sections: &mut [&mut Section]) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(sections.len());
        for section in sections.iter_mut() {
            let Some(value) = section.value().map(str::to_string) else {
                continue;
            };
            if section.is_dirty() || section.cache().is_none() {
                let fragment = self.fragment(section, &value);
                section.store_cache(fragment);
            }
            if let Some(fragment) = section.cache() {
                parts.push(fragment.to_string());
            }
        }
        parts.join(&self.separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rg_status_core::{Core, SectionBuilder, State};
    use std::collections::HashMap;
    use tokio::sync::mpsc;

    fn plain() -> TextRenderer {
        TextRenderer::new(TextRendererConfig {
            colour: false,
            ..Default::default()
        })
    }

    fn core() -> Core {
        let (tx, _rx) = mpsc::unbounded_channel();
        let core = Core::new(Vec::new(), HashMap::new(), tx);
        core.start();
        core
    }

    #[test]
    fn test_empty_registry_gives_empty_line() {
        let core = core();
        assert_eq!(core.regenerate(&mut plain()), "");
    }

    #[test]
    fn test_labels_values_and_separator() {
        let core = core();
        let time = core.insert(SectionBuilder::new("time")).unwrap();
        let battery = core
            .insert(SectionBuilder::new("battery").instance("BAT0").label("BAT"))
            .unwrap();
        let _idle = core.insert(SectionBuilder::new("command")).unwrap();
        time.set_value("12:00");
        battery.set_value("80%");
        assert_eq!(core.regenerate(&mut plain()), "12:00 | BAT: 80%");
    }

    #[test]
    fn test_width_rules_apply() {
        let core = core();
        let a = core
            .insert(SectionBuilder::new("a").max_width(6).align(rg_status_core::Align::Right))
            .unwrap();
        let b = core.insert(SectionBuilder::new("b").max_width(-4)).unwrap();
        a.set_value("1%");
        b.set_value("overflowing");
        assert_eq!(core.regenerate(&mut plain()), "    1% | ove…");
    }

    #[test]
    fn test_cache_follows_changes() {
        let core = core();
        let mut renderer = plain();
        let time = core.insert(SectionBuilder::new("time")).unwrap();
        time.set_value("12:00");
        assert_eq!(core.regenerate(&mut renderer), "12:00");
        assert_eq!(core.with_section("time", |s| s.cache().map(str::to_string)), Some(Some("12:00".to_string())));
        time.set_value("12:01");
        assert_eq!(core.regenerate(&mut renderer), "12:01");
    }

    #[test]
    fn test_default_config_has_no_escapes() {
        let core = core();
        let mut renderer = TextRenderer::new(TextRendererConfig::default());
        let battery = core.insert(SectionBuilder::new("battery").label("BAT")).unwrap();
        battery.set_value("5%");
        battery.set_state(State::Bad, true);
        assert_eq!(core.regenerate(&mut renderer), "BAT: 5%");
    }

    #[test]
    fn test_colour_uses_state_and_urgency() {
        let core = core();
        let mut renderer = TextRenderer::new(TextRendererConfig {
            colour: true,
            ..Default::default()
        });
        let battery = core.insert(SectionBuilder::new("battery")).unwrap();
        battery.set_value("5%");
        battery.set_state(State::Bad, true);
        let line = core.regenerate(&mut renderer);
        assert!(line.contains("\u{1b}["));
        assert!(line.contains("5%"));
        assert!(line.contains("38;2;224;108;117"));
    }
}
