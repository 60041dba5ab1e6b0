//! Coalescing regeneration scheduler
//!
//! Any number of section mutations within one event-loop turn produce at
//! most one queued regeneration. Until the aggregator is started, plain
//! requests only remember that a display is owed; urgent ones go through.

/// Observable scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    /// A regeneration is queued on the event loop
    PendingRegeneration,
    /// Not started: requests are recorded but not acted upon
    Suppressed,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    started: bool,
    pending: bool,
    should_display: bool,
}

impl Scheduler {
    /// A new scheduler starts suppressed
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SchedulerState {
        if self.pending {
            SchedulerState::PendingRegeneration
        } else if !self.started {
            SchedulerState::Suppressed
        } else {
            SchedulerState::Idle
        }
    }

    pub fn should_display(&self) -> bool {
        self.should_display
    }

    /// Ask for a regeneration. Returns true when the caller must enqueue
    /// the regeneration task.
    pub fn request(&mut self, urgent: bool) -> bool {
        if self.pending {
            return false;
        }
        if !self.started && !urgent {
            self.should_display = true;
            return false;
        }
        self.pending = true;
        true
    }

    /// Leave suppression. Returns true when a display was owed and the
    /// caller must enqueue the regeneration task.
    pub fn start(&mut self) -> bool {
        self.started = true;
        if !std::mem::take(&mut self.should_display) {
            return false;
        }
        if self.pending {
            return false;
        }
        self.pending = true;
        true
    }

    /// Enter suppression
    pub fn stop(&mut self) {
        self.started = false;
    }

    /// Called by the regeneration task as it runs
    pub fn complete(&mut self) {
        self.pending = false;
    }
}
