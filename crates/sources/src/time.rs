//! Time input plugin
//!
//! One section per configured timezone. A primary click toggles between
//! the main and the alternative format.

use crate::insert_section;
use crate::ticker::Ticker;
use anyhow::{anyhow, bail, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use log::{debug, warn};
use rg_status_core::{plugin_config, Core, InputPlugin, SectionBuilder, SectionHandle};
use rg_status_types::TimeSourceConfig;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
enum Zone {
    Local,
    Named(Tz),
}

impl FromStr for Zone {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "Local" {
            return Ok(Zone::Local);
        }
        s.parse::<Tz>()
            .map(Zone::Named)
            .map_err(|e| anyhow!("Unknown timezone {}: {}", s, e))
    }
}

impl Zone {
    fn format(&self, now: DateTime<Utc>, format: &str) -> String {
        match self {
            Zone::Local => now.with_timezone(&Local).format(format).to_string(),
            Zone::Named(tz) => now.with_timezone(tz).format(format).to_string(),
        }
    }
}

/// A format string chrono would fail to render
fn check_format(format: &str) -> Result<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        bail!("Invalid time format: {}", format);
    }
    Ok(())
}

/// Delay until the next whole `period_secs` boundary
fn until_next_tick(now: DateTime<Utc>, period_secs: i64) -> Duration {
    let into_period =
        now.timestamp().rem_euclid(period_secs) * 1000 + i64::from(now.timestamp_subsec_millis());
    let remaining = (period_secs * 1000 - into_period).max(1);
    Duration::from_millis(remaining as u64)
}

struct Clock {
    zone: Zone,
    format: Rc<str>,
    format_alt: Rc<str>,
    alt: Cell<bool>,
    section: RefCell<Option<SectionHandle>>,
}

impl Clock {
    fn refresh(&self, now: DateTime<Utc>) {
        let format = if self.alt.get() {
            &self.format_alt
        } else {
            &self.format
        };
        if let Some(section) = self.section.borrow().as_ref() {
            section.set_value(self.zone.format(now, format));
        }
    }

    fn toggle(&self) {
        self.alt.set(!self.alt.get());
        self.refresh(Utc::now());
    }
}

pub struct TimeSource {
    clocks: Vec<Rc<Clock>>,
    ticker: Ticker,
    period_secs: i64,
}

pub(crate) fn create(core: &Core, config: &Value) -> Result<Box<dyn InputPlugin>> {
    let config: TimeSourceConfig = plugin_config(config)?;
    Ok(Box::new(TimeSource::new(core, config)?))
}

impl TimeSource {
    pub fn new(core: &Core, config: TimeSourceConfig) -> Result<Self> {
        check_format(&config.format)?;
        check_format(&config.format_alt)?;
        let format: Rc<str> = Rc::from(config.format.as_str());
        let format_alt: Rc<str> = Rc::from(config.format_alt.as_str());

        // A lone local clock needs no instance
        let single_local = config.zones.len() == 1 && config.zones[0] == "Local";

        let now = Utc::now();
        let mut clocks = Vec::new();
        for name in &config.zones {
            let zone = match name.parse::<Zone>() {
                Ok(zone) => zone,
                Err(e) => {
                    warn!("{}", e);
                    continue;
                }
            };
            let clock = Rc::new(Clock {
                zone,
                format: Rc::clone(&format),
                format_alt: Rc::clone(&format_alt),
                alt: Cell::new(false),
                section: RefCell::new(None),
            });

            let weak: Weak<Clock> = Rc::downgrade(&clock);
            let mut builder = SectionBuilder::new("time").action(move |event| {
                if event == "mouse:1" {
                    if let Some(clock) = weak.upgrade() {
                        clock.toggle();
                    }
                }
            });
            if !single_local {
                builder = builder.instance(name.as_str());
            }
            let Some(section) = insert_section(core, builder) else {
                continue;
            };
            *clock.section.borrow_mut() = Some(section);
            clock.refresh(now);
            clocks.push(clock);
        }

        if clocks.is_empty() {
            bail!("No usable timezone in {:?}", config.zones);
        }

        Ok(Self {
            clocks,
            ticker: Ticker::new(),
            period_secs: if config.needs_seconds() { 1 } else { 60 },
        })
    }
}

impl InputPlugin for TimeSource {
    fn name(&self) -> &str {
        "time"
    }

    fn start(&mut self) {
        let clocks = self.clocks.clone();
        let period_secs = self.period_secs;
        debug!("Time ticks every {}s", period_secs);
        self.ticker.start(move || {
            let now = Utc::now();
            for clock in &clocks {
                clock.refresh(now);
            }
            until_next_tick(now, period_secs)
        });
    }

    fn stop(&mut self) {
        self.ticker.stop();
    }

    fn uninit(&mut self) {
        self.ticker.stop();
        for clock in &self.clocks {
            clock.section.borrow_mut().take();
        }
    }
}
