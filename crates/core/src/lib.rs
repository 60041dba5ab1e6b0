//! rg-status-core: the section aggregation and delivery engine.
//!
//! This crate contains the Section model and its ordered registry, the
//! coalescing regeneration scheduler, the per-stream delivery manager,
//! the action router and the plugin traits (InputPlugin, Renderer) with
//! the name-keyed PluginRegistry.
//!
//! Everything here runs on one thread: a tokio current-thread runtime
//! driving a `LocalSet`. Core state lives in `Rc<RefCell<_>>`.

pub mod constants;
mod action;
mod aggregator;
mod context;
pub mod delivery;
mod error;
mod event;
mod plugin;
mod registry;
mod scheduler;
mod section;

pub use action::ActionEvent;
pub use aggregator::{Aggregator, AggregatorSettings, Flow};
pub use context::{Core, SectionHandle};
pub use delivery::{
    DeliveryManager, ListenAddress, ReconnectPolicy, ServerId, StreamAddress, StreamId, StreamIo,
};
pub use error::{ActionParseError, AddressError, SectionError, StreamError};
pub use event::{LoopEvent, LoopReceiver, LoopSender};
pub use plugin::{
    plugin_config, ActionParser, InputFactory, InputPlugin, PluginRegistry, Renderer,
    RendererFactory,
};
pub use registry::SectionRegistry;
pub use scheduler::{Scheduler, SchedulerState};
pub use section::{ActionCallback, Section, SectionBuilder};

// Re-export types used in trait signatures for convenience
pub use rg_status_types::{Align, Color, SectionOverride, State};
