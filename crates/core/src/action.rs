//! Action router: inbound user actions to section callbacks

use crate::context::Core;
use log::{debug, trace};

/// One user action aimed at a section, e.g. `("battery:BAT0", "mouse:1")`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEvent {
    pub section_id: String,
    pub event_id: String,
}

impl ActionEvent {
    pub fn new(section_id: impl Into<String>, event_id: impl Into<String>) -> Self {
        Self {
            section_id: section_id.into(),
            event_id: event_id.into(),
        }
    }
}

impl Core {
    /// Dispatch an action to its section's handler.
    ///
    /// Unknown ids and sections without a handler are silently dropped.
    /// Returns whether a handler ran.
    pub fn route(&self, section_id: &str, event_id: &str) -> bool {
        // The handler usually mutates its own section, so no borrow of the
        // core may be held while it runs.
        let Some(callback) = self.action_for(section_id) else {
            debug!("Dropping action {} for unknown or inert section {}", event_id, section_id);
            return false;
        };
        trace!("Routing action {} to {}", event_id, section_id);
        callback(event_id);
        true
    }

    pub fn route_event(&self, event: &ActionEvent) -> bool {
        self.route(&event.section_id, &event.event_id)
    }
}
