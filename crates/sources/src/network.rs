//! Network interface input plugin
//!
//! Shows per-interface throughput from sysinfo. A primary click on a
//! section flips it between rates and totals since boot.

use crate::insert_section;
use crate::ticker::Ticker;
use anyhow::Result;
use log::{debug, warn};
use rg_status_core::{plugin_config, Core, InputPlugin, SectionBuilder, SectionHandle};
use rg_status_types::{NetworkField, NetworkSourceConfig, State};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};
use sysinfo::Networks;

const BYTES_PER_KB: f64 = 1024.0;
const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

/// Human readable byte count
fn format_bytes(bytes: f64) -> String {
    let mut value = bytes;
    let mut unit = 0;
    while value >= BYTES_PER_KB && unit < UNITS.len() - 1 {
        value /= BYTES_PER_KB;
        unit += 1;
    }
    if unit == 0 {
        format!("{:.0}{}", value, UNITS[unit])
    } else {
        format!("{:.1}{}", value, UNITS[unit])
    }
}

/// One interface's counters at a refresh
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Sample {
    /// Bytes since the previous refresh
    received: u64,
    transmitted: u64,
    total_received: u64,
    total_transmitted: u64,
}

impl Sample {
    /// Value and state for the section; `elapsed` is the time the
    /// per-refresh counters cover
    fn describe(&self, field: NetworkField, elapsed: Duration) -> (String, State) {
        if self.total_received == 0 && self.total_transmitted == 0 {
            return ("no traffic".to_string(), State::Unavailable);
        }
        let value = match field {
            NetworkField::Rate => {
                let secs = elapsed.as_secs_f64();
                let (down, up) = if secs > 0.0 {
                    (self.received as f64 / secs, self.transmitted as f64 / secs)
                } else {
                    (0.0, 0.0)
                };
                format!("down {}/s up {}/s", format_bytes(down), format_bytes(up))
            }
            NetworkField::Total => format!(
                "down {} up {}",
                format_bytes(self.total_received as f64),
                format_bytes(self.total_transmitted as f64)
            ),
        };
        (value, State::Good)
    }
}

fn flip(field: NetworkField) -> NetworkField {
    match field {
        NetworkField::Rate => NetworkField::Total,
        NetworkField::Total => NetworkField::Rate,
    }
}

struct Interface {
    name: String,
    field: Cell<NetworkField>,
    last: Cell<Sample>,
    elapsed: Cell<Duration>,
    section: RefCell<Option<SectionHandle>>,
}

impl Interface {
    fn show(&self) {
        let (value, state) = self.last.get().describe(self.field.get(), self.elapsed.get());
        if let Some(section) = self.section.borrow().as_ref() {
            section.set_value(value);
            section.set_state(state, false);
        }
    }

    fn toggle(&self) {
        self.field.set(flip(self.field.get()));
        self.show();
    }
}

struct Monitor {
    networks: Networks,
    interfaces: Vec<Rc<Interface>>,
    refreshed: Instant,
}

impl Monitor {
    fn poll(&mut self) {
        self.networks.refresh();
        let now = Instant::now();
        let elapsed = now.duration_since(self.refreshed);
        self.refreshed = now;

        for interface in &self.interfaces {
            let sample = self
                .networks
                .iter()
                .find(|(name, _)| name.as_str() == interface.name)
                .map(|(_, data)| Sample {
                    received: data.received(),
                    transmitted: data.transmitted(),
                    total_received: data.total_received(),
                    total_transmitted: data.total_transmitted(),
                })
                .unwrap_or_default();
            interface.last.set(sample);
            interface.elapsed.set(elapsed);
            interface.show();
        }
    }
}

/// Interfaces to show, in display order
fn select_interfaces(available: &[String], wanted: &[String]) -> Vec<String> {
    if wanted.is_empty() {
        let mut names: Vec<String> = available
            .iter()
            .filter(|name| name.as_str() != "lo")
            .cloned()
            .collect();
        names.sort();
        return names;
    }
    for name in wanted {
        if !available.contains(name) {
            warn!("Network interface {} not found", name);
        }
    }
    wanted
        .iter()
        .filter(|name| available.contains(name))
        .cloned()
        .collect()
}

pub struct NetworkSource {
    monitor: Rc<RefCell<Monitor>>,
    interval: Duration,
    ticker: Ticker,
}

pub(crate) fn create(core: &Core, config: &Value) -> Result<Box<dyn InputPlugin>> {
    let config: NetworkSourceConfig = plugin_config(config)?;
    Ok(Box::new(NetworkSource::new(core, config)))
}

impl NetworkSource {
    pub fn new(core: &Core, config: NetworkSourceConfig) -> Self {
        let networks = Networks::new_with_refreshed_list();
        let available: Vec<String> = networks.iter().map(|(name, _)| name.clone()).collect();

        let mut interfaces = Vec::new();
        for name in select_interfaces(&available, &config.interfaces) {
            let interface = Rc::new(Interface {
                name: name.clone(),
                field: Cell::new(config.field),
                last: Cell::new(Sample::default()),
                elapsed: Cell::new(Duration::ZERO),
                section: RefCell::new(None),
            });
            let weak: Weak<Interface> = Rc::downgrade(&interface);
            let builder = SectionBuilder::new("network")
                .instance(name.as_str())
                .action(move |event| {
                    if event == "mouse:1" {
                        if let Some(interface) = weak.upgrade() {
                            interface.toggle();
                        }
                    }
                });
            let Some(section) = insert_section(core, builder) else {
                continue;
            };
            *interface.section.borrow_mut() = Some(section);
            interfaces.push(interface);
        }
        debug!("Watching {} network interface(s)", interfaces.len());

        let mut monitor = Monitor {
            networks,
            interfaces,
            refreshed: Instant::now(),
        };
        monitor.poll();

        Self {
            monitor: Rc::new(RefCell::new(monitor)),
            interval: Duration::from_secs(config.interval_secs.max(1)),
            ticker: Ticker::new(),
        }
    }
}

impl InputPlugin for NetworkSource {
    fn name(&self) -> &str {
        "network"
    }

    fn start(&mut self) {
        let monitor = Rc::clone(&self.monitor);
        self.ticker.every(self.interval, move || monitor.borrow_mut().poll());
    }

    fn stop(&mut self) {
        self.ticker.stop();
    }

    fn uninit(&mut self) {
        self.ticker.stop();
        for interface in &self.monitor.borrow().interfaces {
            interface.section.borrow_mut().take();
        }
    }
}
