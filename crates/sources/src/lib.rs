//! rg-status-sources: Built-in input plugins for rg-status.
//!
//! Every plugin is created by a factory that receives the shared
//! [`Core`] and its own JSON config object, inserts its initial sections
//! and hands back a boxed [`InputPlugin`]. Periodic work runs as local
//! tasks started and stopped with the aggregator.

mod battery;
mod command;
mod network;
mod sensors;
mod ticker;
mod time;

pub use battery::BatterySource;
pub use command::CommandSource;
pub use network::NetworkSource;
pub use sensors::SensorsSource;
pub use time::TimeSource;

use log::{debug, warn};
use rg_status_core::{Core, PluginRegistry, SectionBuilder, SectionError, SectionHandle};

/// Register all built-in input plugins
pub fn register_all(registry: &mut PluginRegistry) {
    registry.register_input("time", time::create);
    registry.register_input("battery", battery::create);
    registry.register_input("network", network::create);
    registry.register_input("sensors", sensors::create);
    registry.register_input("command", command::create);
}

/// Insert a section; a rejected section is logged and skipped
pub(crate) fn insert_section(core: &Core, builder: SectionBuilder) -> Option<SectionHandle> {
    match core.insert(builder) {
        Ok(handle) => Some(handle),
        Err(e @ SectionError::Disabled(_)) => {
            debug!("{}", e);
            None
        }
        Err(e) => {
            warn!("{}", e);
            None
        }
    }
}
