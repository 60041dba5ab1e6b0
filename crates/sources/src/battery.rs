//! Battery input plugin
//!
//! Reads the kernel power supply class tree. Every supply of type
//! `Battery` gets a section; devices are re-scanned on each poll so
//! hot-plugged batteries come and go.

use crate::insert_section;
use crate::ticker::Ticker;
use anyhow::Result;
use log::{debug, info, trace};
use rg_status_core::{plugin_config, Core, InputPlugin, SectionBuilder, SectionHandle};
use rg_status_types::{BatterySourceConfig, State};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

/// Capacity at or above which a battery is Good
const GOOD_CAPACITY: u8 = 60;
/// Capacity at or above which a battery is Average
const AVERAGE_CAPACITY: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChargeStatus {
    Charging,
    Discharging,
    Full,
    NotCharging,
    Unknown,
}

impl ChargeStatus {
    fn parse(s: &str) -> Self {
        match s.trim() {
            "Charging" => ChargeStatus::Charging,
            "Discharging" => ChargeStatus::Discharging,
            "Full" => ChargeStatus::Full,
            "Not charging" => ChargeStatus::NotCharging,
            _ => ChargeStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct BatteryReading {
    name: String,
    capacity: Option<u8>,
    status: ChargeStatus,
}

impl BatteryReading {
    /// Value, state and urgency for the section
    fn describe(&self, urgent_below: u8) -> (Option<String>, State, bool) {
        let Some(capacity) = self.capacity else {
            return (None, State::Unavailable, false);
        };
        let marker = match self.status {
            ChargeStatus::Charging => "+",
            ChargeStatus::Discharging => "-",
            _ => "",
        };
        let state = if capacity >= GOOD_CAPACITY {
            State::Good
        } else if capacity >= AVERAGE_CAPACITY {
            State::Average
        } else {
            State::Bad
        };
        let urgent = self.status == ChargeStatus::Discharging && capacity < urgent_below;
        (Some(format!("{}%{}", capacity, marker)), state, urgent)
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

fn read_number(path: &Path) -> Option<u64> {
    read_trimmed(path)?.parse().ok()
}

/// Capacity in percent; falls back to energy or charge counters
fn read_capacity(device: &Path) -> Option<u8> {
    if let Some(capacity) = read_number(&device.join("capacity")) {
        return Some(capacity.min(100) as u8);
    }
    for (now, full) in [("energy_now", "energy_full"), ("charge_now", "charge_full")] {
        let now = read_number(&device.join(now));
        let full = read_number(&device.join(full));
        if let (Some(now), Some(full)) = (now, full) {
            if full > 0 {
                return Some((now * 100 / full).min(100) as u8);
            }
        }
    }
    None
}

/// Every battery under the power supply directory, sorted by name
fn scan(dir: &Path) -> Vec<BatteryReading> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            trace!("Cannot read {}: {}", dir.display(), e);
            return Vec::new();
        }
    };
    let mut readings: Vec<BatteryReading> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| read_trimmed(&path.join("type")).as_deref() == Some("Battery"))
        .filter_map(|path| {
            let name = path.file_name()?.to_string_lossy().into_owned();
            Some(BatteryReading {
                name,
                capacity: read_capacity(&path),
                status: read_trimmed(&path.join("status"))
                    .map(|s| ChargeStatus::parse(&s))
                    .unwrap_or(ChargeStatus::Unknown),
            })
        })
        .collect();
    readings.sort_by(|a, b| a.name.cmp(&b.name));
    readings
}

struct Batteries {
    core: Core,
    dir: PathBuf,
    urgent_below: u8,
    sections: BTreeMap<String, SectionHandle>,
}

impl Batteries {
    fn poll(&mut self) {
        let readings = scan(&self.dir);

        let before = self.sections.len();
        self.sections
            .retain(|name, _| readings.iter().any(|reading| &reading.name == name));
        if self.sections.len() != before {
            info!("{} battery(s) removed", before - self.sections.len());
        }

        for reading in &readings {
            if !self.sections.contains_key(&reading.name) {
                let builder = SectionBuilder::new("battery").instance(reading.name.as_str());
                let Some(section) = insert_section(&self.core, builder) else {
                    continue;
                };
                debug!("Battery {} found", reading.name);
                self.sections.insert(reading.name.clone(), section);
            }
            let Some(section) = self.sections.get(&reading.name) else {
                continue;
            };
            let (value, state, urgent) = reading.describe(self.urgent_below);
            match value {
                Some(value) => section.set_value(value),
                None => section.clear_value(),
            }
            section.set_state(state, urgent);
        }
    }
}

pub struct BatterySource {
    batteries: Rc<RefCell<Batteries>>,
    interval: Duration,
    ticker: Ticker,
}

pub(crate) fn create(core: &Core, config: &Value) -> Result<Box<dyn InputPlugin>> {
    let config: BatterySourceConfig = plugin_config(config)?;
    Ok(Box::new(BatterySource::new(core, config)))
}

impl BatterySource {
    pub fn new(core: &Core, config: BatterySourceConfig) -> Self {
        let mut batteries = Batteries {
            core: core.clone(),
            dir: PathBuf::from(&config.power_supply_dir),
            urgent_below: config.urgent_below,
            sections: BTreeMap::new(),
        };
        batteries.poll();
        Self {
            batteries: Rc::new(RefCell::new(batteries)),
            interval: Duration::from_secs(config.interval_secs.max(1)),
            ticker: Ticker::new(),
        }
    }
}

impl InputPlugin for BatterySource {
    fn name(&self) -> &str {
        "battery"
    }

    fn start(&mut self) {
        let batteries = Rc::clone(&self.batteries);
        self.ticker.every(self.interval, move || batteries.borrow_mut().poll());
    }

    fn stop(&mut self) {
        self.ticker.stop();
    }

    fn uninit(&mut self) {
        self.ticker.stop();
        self.batteries.borrow_mut().sections.clear();
    }
}
