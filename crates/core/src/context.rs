//! Aggregator context shared by input plugins and the event loop
//!
//! `Core` owns the section registry, the scheduler and the override
//! rules. Input plugins hold a clone of it to insert sections; the
//! `SectionHandle`s they get back are their only way to mutate them.

use crate::event::{LoopEvent, LoopSender};
use crate::plugin::Renderer;
use crate::registry::{SectionKey, SectionRegistry};
use crate::scheduler::{Scheduler, SchedulerState};
use crate::section::{ActionCallback, Section, SectionBuilder};
use crate::error::SectionError;
use log::{debug, info, trace};
use rg_status_types::{Color, SectionOverride, State};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

pub(crate) struct CoreState {
    registry: SectionRegistry,
    scheduler: Scheduler,
    overrides: HashMap<String, SectionOverride>,
    events: LoopSender,
}

impl CoreState {
    /// Ask the scheduler for a regeneration and queue it if needed
    fn request(&mut self, urgent: bool) {
        if self.scheduler.request(urgent) {
            trace!("Queueing regeneration (urgent: {})", urgent);
            // A closed loop only happens during shutdown
            let _ = self.events.send(LoopEvent::Regenerate);
        }
    }

    /// Apply a live mutation and mark the section dirty if it changed
    fn mutate<F>(&mut self, key: SectionKey, f: F)
    where
        F: FnOnce(&mut Section) -> bool,
    {
        let Some(section) = self.registry.get_mut(key) else {
            return;
        };
        if !f(section) {
            return;
        }
        let first_mark = !section.dirty;
        section.dirty = true;
        let urgent = section.urgent;
        if first_mark || urgent {
            self.request(urgent);
        }
    }

    fn override_for(&self, id: &str, name: &str) -> Option<&SectionOverride> {
        self.overrides.get(id).or_else(|| self.overrides.get(name))
    }
}

/// Cheaply clonable handle to the aggregator context
#[derive(Clone)]
pub struct Core {
    inner: Rc<RefCell<CoreState>>,
}

impl Core {
    pub fn new(
        display_order: Vec<String>,
        overrides: HashMap<String, SectionOverride>,
        events: LoopSender,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(CoreState {
                registry: SectionRegistry::new(display_order),
                scheduler: Scheduler::new(),
                overrides,
                events,
            })),
        }
    }

    /// Freeze a builder and register it.
    ///
    /// Override rules are applied first; a `disable` rule rejects the
    /// section. On error the builder is gone and the caller just carries on
    /// without that section.
    pub fn insert(&self, mut builder: SectionBuilder) -> Result<SectionHandle, SectionError> {
        let mut state = self.inner.borrow_mut();
        let id = builder.id();

        if let Some(rule) = state.override_for(&id, &builder.name) {
            if rule.disable {
                debug!("Section {} disabled by override", id);
                return Err(SectionError::Disabled(id));
            }
            if let Some(label) = &rule.label {
                builder.label = Some(label.clone());
            }
            if let Some(colour) = rule.label_colour {
                builder.label_colour = Some(colour);
            }
            if let Some(align) = rule.align {
                builder.align = align;
            }
            if let Some(max_width) = rule.max_width {
                builder.max_width = max_width;
            }
        }

        if state.registry.contains(&id) {
            return Err(SectionError::Duplicate(id));
        }

        let weight = state.registry.weight_for(&id, &builder.name);
        let key = state.registry.insert(Section::freeze(builder, weight))?;
        debug!("Inserted section {} (weight {})", id, weight);
        state.request(false);

        Ok(SectionHandle {
            core: Rc::downgrade(&self.inner),
            key,
            id,
        })
    }

    /// Bound action handler of a section, if any
    pub fn action_for(&self, id: &str) -> Option<ActionCallback> {
        self.inner
            .borrow()
            .registry
            .lookup(id)
            .and_then(|section| section.action.clone())
    }

    /// Leave suppression; sorts the registry the first time
    pub fn start(&self) {
        let mut state = self.inner.borrow_mut();
        if !state.registry.is_sorted() {
            state.registry.sort();
            info!("Display order: {:?}", state.registry.ids());
        }
        if state.scheduler.start() {
            let _ = state.events.send(LoopEvent::Regenerate);
        }
    }

    /// Enter suppression
    pub fn stop(&self) {
        self.inner.borrow_mut().scheduler.stop();
    }

    pub fn request_regeneration(&self, urgent: bool) {
        self.inner.borrow_mut().request(urgent);
    }

    /// Regeneration task body: render the full ordered snapshot
    pub fn regenerate(&self, renderer: &mut dyn Renderer) -> String {
        let mut state = self.inner.borrow_mut();
        state.scheduler.complete();
        let mut sections = state.registry.snapshot_mut();
        let line = renderer.render(&mut sections);
        // The renderer has seen every change by now
        for section in sections {
            section.dirty = false;
        }
        line
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.inner.borrow().scheduler.state()
    }

    /// Ids in display order
    pub fn section_ids(&self) -> Vec<String> {
        self.inner.borrow().registry.ids()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().registry.is_empty()
    }

    /// Read access to one section
    pub fn with_section<R>(&self, id: &str, f: impl FnOnce(&Section) -> R) -> Option<R> {
        self.inner.borrow().registry.lookup(id).map(f)
    }
}

impl fmt::Debug for Core {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(state) => f
                .debug_struct("Core")
                .field("sections", &state.registry.ids())
                .field("scheduler", &state.scheduler.state())
                .finish(),
            Err(_) => f.write_str("Core { <borrowed> }"),
        }
    }
}

/// Live half of a section, owned by the input plugin that created it.
///
/// Dropping the handle removes the section from the registry.
pub struct SectionHandle {
    core: Weak<RefCell<CoreState>>,
    key: SectionKey,
    id: String,
}

impl SectionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    fn mutate<F>(&self, f: F)
    where
        F: FnOnce(&mut Section) -> bool,
    {
        if let Some(core) = self.core.upgrade() {
            core.borrow_mut().mutate(self.key, f);
        }
    }

    /// Set the health state and the urgent flag
    pub fn set_state(&self, state: State, urgent: bool) {
        self.mutate(|s| {
            let changed = s.state != state || s.urgent != urgent;
            s.state = state;
            s.urgent = urgent;
            changed
        });
    }

    pub fn set_colour(&self, colour: Option<Color>) {
        self.mutate(|s| replace(&mut s.colour, colour));
    }

    pub fn set_background_colour(&self, colour: Option<Color>) {
        self.mutate(|s| replace(&mut s.background_colour, colour));
    }

    pub fn set_value(&self, value: impl Into<String>) {
        let value = Some(value.into());
        self.mutate(|s| replace(&mut s.value, value));
    }

    /// Nothing to show right now
    pub fn clear_value(&self) {
        self.mutate(|s| replace(&mut s.value, None));
    }

    pub fn set_short_value(&self, short_value: Option<String>) {
        self.mutate(|s| replace(&mut s.short_value, short_value));
    }

    /// Unregister the section
    pub fn remove(self) {}
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

impl Drop for SectionHandle {
    fn drop(&mut self) {
        let Some(core) = self.core.upgrade() else {
            return;
        };
        let Ok(mut state) = core.try_borrow_mut() else {
            log::warn!("Section {} dropped while the core was busy; leaving it registered", self.id);
            return;
        };
        if state.registry.remove(self.key).is_some() {
            debug!("Removed section {}", self.id);
            state.request(false);
        }
    }
}

impl fmt::Debug for SectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectionHandle").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_SECTION_WIDTH;
    use crate::event::LoopReceiver;
    use rg_status_types::Align;
    use std::cell::Cell;
    use tokio::sync::mpsc;

    /// Records each pass and the values it saw
    #[derive(Default)]
    struct RecordingRenderer {
        passes: Rc<Cell<usize>>,
    }

    impl Renderer for RecordingRenderer {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn render(&mut self, sections: &mut [&mut Section]) -> String {
            self.passes.set(self.passes.get() + 1);
            sections
                .iter()
                .map(|s| format!("{}={}", s.id(), s.value().unwrap_or("-")))
                .collect::<Vec<_>>()
                .join(" ")
        }
    }

    fn core_with(order: &[&str]) -> (Core, LoopReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let order = order.iter().map(|s| s.to_string()).collect();
        (Core::new(order, HashMap::new(), tx), rx)
    }

    fn drain(rx: &mut LoopReceiver) -> usize {
        let mut regenerations = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, LoopEvent::Regenerate) {
                regenerations += 1;
            }
        }
        regenerations
    }

    #[test]
    fn test_insertion_order_without_configured_order() {
        let (core, _rx) = core_with(&[]);
        let _time = core.insert(SectionBuilder::new("time")).unwrap();
        let _battery = core.insert(SectionBuilder::new("battery")).unwrap();
        core.start();
        assert_eq!(core.section_ids(), vec!["time", "battery"]);
    }

    #[test]
    fn test_configured_order_after_start() {
        let (core, _rx) = core_with(&["battery", "time"]);
        let _time = core.insert(SectionBuilder::new("time")).unwrap();
        let _battery = core.insert(SectionBuilder::new("battery")).unwrap();
        core.start();
        assert_eq!(core.section_ids(), vec!["battery", "time"]);
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let (core, _rx) = core_with(&[]);
        let _first = core.insert(SectionBuilder::new("battery").instance("BAT0")).unwrap();
        let err = core
            .insert(SectionBuilder::new("battery").instance("BAT0").label("other"))
            .unwrap_err();
        assert_eq!(err, SectionError::Duplicate("battery:BAT0".to_string()));
        assert_eq!(core.len(), 1);
        assert_eq!(core.with_section("battery:BAT0", |s| s.label().is_none()), Some(true));
    }

    #[test]
    fn test_disable_override_rejects() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut overrides = HashMap::new();
        overrides.insert(
            "network".to_string(),
            SectionOverride {
                disable: true,
                ..Default::default()
            },
        );
        let core = Core::new(Vec::new(), overrides, tx);
        let err = core.insert(SectionBuilder::new("network").instance("eth0")).unwrap_err();
        assert_eq!(err, SectionError::Disabled("network:eth0".to_string()));
        assert!(core.is_empty());
    }

    #[test]
    fn test_override_replaces_build_time_attributes() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut overrides = HashMap::new();
        overrides.insert(
            "battery:BAT0".to_string(),
            SectionOverride {
                label: Some("B".to_string()),
                align: Some(Align::Right),
                max_width: Some(8),
                ..Default::default()
            },
        );
        let core = Core::new(Vec::new(), overrides, tx);
        let _handle = core
            .insert(SectionBuilder::new("battery").instance("BAT0").label("Battery"))
            .unwrap();
        let (label, align, width) = core
            .with_section("battery:BAT0", |s| {
                (s.label().map(str::to_string), s.align(), s.max_width())
            })
            .unwrap();
        assert_eq!(label.as_deref(), Some("B"));
        assert_eq!(align, Align::Right);
        assert_eq!(width, 8);
    }

    #[test]
    fn test_oversized_widths_are_clamped() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut overrides = HashMap::new();
        overrides.insert(
            "network".to_string(),
            SectionOverride {
                max_width: Some(i64::MAX),
                ..Default::default()
            },
        );
        let core = Core::new(Vec::new(), overrides, tx);
        let _network = core.insert(SectionBuilder::new("network")).unwrap();
        let _sensors = core
            .insert(SectionBuilder::new("sensors").max_width(i64::MIN))
            .unwrap();
        assert_eq!(core.with_section("network", |s| s.max_width()), Some(MAX_SECTION_WIDTH));
        assert_eq!(core.with_section("sensors", |s| s.max_width()), Some(-MAX_SECTION_WIDTH));
    }

    #[test]
    fn test_burst_of_mutations_renders_once() {
        let (core, mut rx) = core_with(&[]);
        let a = core.insert(SectionBuilder::new("a")).unwrap();
        let b = core.insert(SectionBuilder::new("b")).unwrap();
        core.start();
        let mut renderer = RecordingRenderer::default();
        drain(&mut rx);
        core.regenerate(&mut renderer);

        for i in 0..50 {
            a.set_value(format!("{}", i));
            b.set_value(format!("x{}", i));
            a.set_state(State::Good, false);
        }
        assert_eq!(drain(&mut rx), 1);
        let line = core.regenerate(&mut renderer);
        assert_eq!(line, "a=49 b=x49");
        assert_eq!(renderer.passes.get(), 2);
        assert_eq!(core.scheduler_state(), SchedulerState::Idle);
    }

    #[test]
    fn test_suppressed_until_start() {
        let (core, mut rx) = core_with(&[]);
        let time = core.insert(SectionBuilder::new("time")).unwrap();
        time.set_value("12:00");
        assert_eq!(drain(&mut rx), 0);
        assert_eq!(core.scheduler_state(), SchedulerState::Suppressed);
        core.start();
        assert_eq!(drain(&mut rx), 1);
    }

    #[test]
    fn test_urgent_mutation_bypasses_suppression() {
        let (core, mut rx) = core_with(&[]);
        let battery = core.insert(SectionBuilder::new("battery")).unwrap();
        battery.set_state(State::Bad, true);
        assert_eq!(drain(&mut rx), 1);
        assert_eq!(core.scheduler_state(), SchedulerState::PendingRegeneration);
    }

    #[test]
    fn test_unchanged_value_does_not_dirty() {
        let (core, mut rx) = core_with(&[]);
        let time = core.insert(SectionBuilder::new("time")).unwrap();
        core.start();
        time.set_value("12:00");
        drain(&mut rx);
        core.regenerate(&mut RecordingRenderer::default());
        time.set_value("12:00");
        assert_eq!(core.with_section("time", |s| s.is_dirty()), Some(false));
        assert_eq!(drain(&mut rx), 0);
    }

    #[test]
    fn test_dropping_handle_removes_section() {
        let (core, _rx) = core_with(&[]);
        let time = core.insert(SectionBuilder::new("time")).unwrap();
        let _battery = core.insert(SectionBuilder::new("battery")).unwrap();
        time.remove();
        assert_eq!(core.section_ids(), vec!["battery"]);
        // the id is free again
        assert!(core.insert(SectionBuilder::new("time")).is_ok());
    }

    #[test]
    fn test_empty_registry_renders() {
        let (core, _rx) = core_with(&[]);
        core.start();
        assert_eq!(core.regenerate(&mut RecordingRenderer::default()), "");
    }

    #[test]
    fn test_handle_outliving_core_is_inert() {
        let (core, _rx) = core_with(&[]);
        let time = core.insert(SectionBuilder::new("time")).unwrap();
        drop(core);
        time.set_value("late");
        drop(time);
    }
}
