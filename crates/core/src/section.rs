//! Section: one named/instanced item of the status line
//!
//! A section goes through two phases. While it is a [`SectionBuilder`]
//! only presentation attributes can be set. Inserting the builder into
//! the [`Core`](crate::Core) freezes those and hands back a
//! [`SectionHandle`](crate::SectionHandle) which only exposes live
//! setters. Renderers see the frozen [`Section`] itself.

use crate::constants::MAX_SECTION_WIDTH;
use rg_status_types::{Align, Color, State};
use std::fmt;
use std::rc::Rc;

/// Action handler bound to a section; receives the event id (e.g. `mouse:1`)
pub type ActionCallback = Rc<dyn Fn(&str)>;

/// Build-time half of a section
pub struct SectionBuilder {
    pub(crate) name: String,
    pub(crate) instance: Option<String>,
    pub(crate) label: Option<String>,
    pub(crate) label_colour: Option<Color>,
    pub(crate) align: Align,
    pub(crate) max_width: i64,
    pub(crate) action: Option<ActionCallback>,
}

impl SectionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance: None,
            label: None,
            label_colour: None,
            align: Align::Left,
            max_width: 0,
            action: None,
        }
    }

    /// Disambiguate sections sharing a name (e.g. a device path)
    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label_colour(mut self, colour: Color) -> Self {
        self.label_colour = Some(colour);
        self
    }

    pub fn align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    /// Positive: fixed width. Negative: maximum width. Zero: unconstrained.
    /// Widths beyond `MAX_SECTION_WIDTH` columns are clamped on insertion.
    pub fn max_width(mut self, max_width: i64) -> Self {
        self.max_width = max_width;
        self
    }

    /// Register the action handler invoked by the action router
    pub fn action<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + 'static,
    {
        self.action = Some(Rc::new(callback));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registry key: `name` or `name:instance`
    pub fn id(&self) -> String {
        section_id(&self.name, self.instance.as_deref())
    }
}

impl fmt::Debug for SectionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectionBuilder")
            .field("id", &self.id())
            .field("label", &self.label)
            .field("align", &self.align)
            .field("max_width", &self.max_width)
            .finish()
    }
}

pub(crate) fn section_id(name: &str, instance: Option<&str>) -> String {
    match instance {
        Some(instance) => format!("{}:{}", name, instance),
        None => name.to_string(),
    }
}

/// A frozen, registered section
pub struct Section {
    name: String,
    instance: Option<String>,
    id: String,
    label: Option<String>,
    label_colour: Option<Color>,
    align: Align,
    max_width: i64,
    pub(crate) state: State,
    pub(crate) urgent: bool,
    pub(crate) colour: Option<Color>,
    pub(crate) background_colour: Option<Color>,
    pub(crate) value: Option<String>,
    pub(crate) short_value: Option<String>,
    pub(crate) weight: usize,
    pub(crate) dirty: bool,
    cache: Option<String>,
    pub(crate) action: Option<ActionCallback>,
}

impl Section {
    pub(crate) fn freeze(builder: SectionBuilder, weight: usize) -> Self {
        let id = builder.id();
        Self {
            name: builder.name,
            instance: builder.instance,
            id,
            label: builder.label,
            label_colour: builder.label_colour,
            align: builder.align,
            max_width: builder
                .max_width
                .clamp(-MAX_SECTION_WIDTH, MAX_SECTION_WIDTH),
            state: State::NoState,
            urgent: false,
            colour: None,
            background_colour: None,
            value: None,
            short_value: None,
            weight,
            dirty: true,
            cache: None,
            action: builder.action,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance(&self) -> Option<&str> {
        self.instance.as_deref()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn label_colour(&self) -> Option<Color> {
        self.label_colour
    }

    pub fn align(&self) -> Align {
        self.align
    }

    pub fn max_width(&self) -> i64 {
        self.max_width
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_urgent(&self) -> bool {
        self.urgent
    }

    pub fn colour(&self) -> Option<Color> {
        self.colour
    }

    pub fn background_colour(&self) -> Option<Color> {
        self.background_colour
    }

    /// Current text payload; `None` means nothing to show right now
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn short_value(&self) -> Option<&str> {
        self.short_value.as_deref()
    }

    pub fn weight(&self) -> usize {
        self.weight
    }

    pub fn has_action(&self) -> bool {
        self.action.is_some()
    }

    /// Whether live attributes changed since the last render
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Renderer-owned fragment from a previous pass
    pub fn cache(&self) -> Option<&str> {
        self.cache.as_deref()
    }

    /// Store a freshly rendered fragment; clears the dirty flag
    pub fn store_cache(&mut self, fragment: String) {
        self.cache = Some(fragment);
        self.dirty = false;
    }
}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Section")
            .field("id", &self.id)
            .field("weight", &self.weight)
            .field("state", &self.state)
            .field("urgent", &self.urgent)
            .field("value", &self.value)
            .field("dirty", &self.dirty)
            .finish()
    }
}
