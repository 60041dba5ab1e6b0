//! Input plugin configuration types.

pub mod battery;
pub mod command;
pub mod network;
pub mod sensors;
pub mod time;

// Re-export all source config types for convenience
pub use battery::BatterySourceConfig;
pub use command::CommandSourceConfig;
pub use network::{NetworkField, NetworkSourceConfig};
pub use sensors::SensorsSourceConfig;
pub use time::TimeSourceConfig;
