//! Temperature sensors input plugin

use crate::insert_section;
use crate::ticker::Ticker;
use anyhow::Result;
use log::debug;
use rg_status_core::{plugin_config, Core, InputPlugin, SectionBuilder, SectionHandle};
use rg_status_types::{SensorsSourceConfig, State};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use sysinfo::Components;

/// Thresholds in degrees Celsius
#[derive(Debug, Clone, Copy)]
struct Thresholds {
    high: f32,
    critical: f32,
}

impl Thresholds {
    /// State and urgency for a reading
    fn classify(&self, celsius: f32) -> (State, bool) {
        if !celsius.is_finite() {
            (State::Unavailable, false)
        } else if celsius >= self.critical {
            (State::Bad, true)
        } else if celsius >= self.high {
            (State::Average, false)
        } else {
            (State::Good, false)
        }
    }
}

fn format_celsius(celsius: f32) -> String {
    format!("{:.0}°C", celsius)
}

struct Probe {
    label: String,
    section: SectionHandle,
}

struct Sensors {
    components: Components,
    probes: Vec<Probe>,
    thresholds: Thresholds,
}

impl Sensors {
    fn poll(&mut self) {
        self.components.refresh();
        for probe in &self.probes {
            let reading = self
                .components
                .iter()
                .find(|c| c.label() == probe.label)
                .map(|c| c.temperature());
            match reading {
                Some(celsius) if celsius.is_finite() => {
                    let (state, urgent) = self.thresholds.classify(celsius);
                    probe.section.set_value(format_celsius(celsius));
                    probe.section.set_state(state, urgent);
                }
                _ => {
                    probe.section.clear_value();
                    probe.section.set_state(State::Unavailable, false);
                }
            }
        }
    }
}

/// Labels to watch; an empty filter keeps every component
fn select_components(labels: Vec<String>, wanted: &[String]) -> Vec<String> {
    let mut selected: Vec<String> = labels
        .into_iter()
        .filter(|label| wanted.is_empty() || wanted.contains(label))
        .collect();
    if !wanted.is_empty() {
        selected.sort_by_key(|label| wanted.iter().position(|w| w == label));
    }
    selected.dedup();
    selected
}

pub struct SensorsSource {
    sensors: Rc<RefCell<Sensors>>,
    interval: Duration,
    ticker: Ticker,
}

pub(crate) fn create(core: &Core, config: &Value) -> Result<Box<dyn InputPlugin>> {
    let config: SensorsSourceConfig = plugin_config(config)?;
    Ok(Box::new(SensorsSource::new(core, config)))
}

impl SensorsSource {
    pub fn new(core: &Core, config: SensorsSourceConfig) -> Self {
        let components = Components::new_with_refreshed_list();
        let labels: Vec<String> = components.iter().map(|c| c.label().to_string()).collect();
        debug!("Found {} temperature component(s)", labels.len());

        let probes = select_components(labels, &config.components)
            .into_iter()
            .filter_map(|label| {
                let section =
                    insert_section(core, SectionBuilder::new("sensors").instance(label.as_str()))?;
                Some(Probe { label, section })
            })
            .collect();

        let mut sensors = Sensors {
            components,
            probes,
            thresholds: Thresholds {
                high: config.high,
                critical: config.critical,
            },
        };
        sensors.poll();

        Self {
            sensors: Rc::new(RefCell::new(sensors)),
            interval: Duration::from_secs(config.interval_secs.max(1)),
            ticker: Ticker::new(),
        }
    }
}

impl InputPlugin for SensorsSource {
    fn name(&self) -> &str {
        "sensors"
    }

    fn start(&mut self) {
        let sensors = Rc::clone(&self.sensors);
        self.ticker.every(self.interval, move || sensors.borrow_mut().poll());
    }

    fn stop(&mut self) {
        self.ticker.stop();
    }

    fn uninit(&mut self) {
        self.ticker.stop();
        self.sensors.borrow_mut().probes.clear();
    }
}
