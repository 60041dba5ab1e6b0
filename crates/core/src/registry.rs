//! Ordered section registry
//!
//! Sections live in an arena; display order is a separate vector of
//! arena slots and an id index gives O(1) lookup for action routing and
//! duplicate rejection.

use crate::constants::UNLISTED_WEIGHT;
use crate::error::SectionError;
use crate::section::Section;
use std::collections::HashMap;

/// Arena slot of a registered section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SectionKey(usize);

/// Ordered collection of live sections keyed by id
pub struct SectionRegistry {
    arena: Vec<Option<Section>>,
    free: Vec<usize>,
    order: Vec<usize>,
    index: HashMap<String, SectionKey>,
    /// Configured display order (ids or bare names)
    display_order: Vec<String>,
    /// Set once the startup sort has run
    sorted: bool,
}

impl SectionRegistry {
    pub fn new(display_order: Vec<String>) -> Self {
        Self {
            arena: Vec::new(),
            free: Vec::new(),
            order: Vec::new(),
            index: HashMap::new(),
            display_order,
            sorted: false,
        }
    }

    /// Sort key for a section: position of its id, else of its bare name,
    /// in the configured order. Unlisted sections go last.
    pub fn weight_for(&self, id: &str, name: &str) -> usize {
        self.display_order
            .iter()
            .position(|entry| entry == id)
            .or_else(|| self.display_order.iter().position(|entry| entry == name))
            .unwrap_or(UNLISTED_WEIGHT)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Insert a frozen section.
    ///
    /// Before the startup sort sections are appended; afterwards they go
    /// after every section of lower or equal weight.
    pub(crate) fn insert(&mut self, section: Section) -> Result<SectionKey, SectionError> {
        if self.index.contains_key(section.id()) {
            return Err(SectionError::Duplicate(section.id().to_string()));
        }

        let weight = section.weight;
        let id = section.id().to_string();
        let slot = match self.free.pop() {
            Some(slot) => {
                self.arena[slot] = Some(section);
                slot
            }
            None => {
                self.arena.push(Some(section));
                self.arena.len() - 1
            }
        };

        if self.sorted {
            let position = self
                .order
                .partition_point(|&other| self.weight_of(other) <= weight);
            self.order.insert(position, slot);
        } else {
            self.order.push(slot);
        }

        let key = SectionKey(slot);
        self.index.insert(id, key);
        Ok(key)
    }

    /// Unlink a section from the order and the index
    pub(crate) fn remove(&mut self, key: SectionKey) -> Option<Section> {
        let section = self.arena.get_mut(key.0)?.take()?;
        self.order.retain(|&slot| slot != key.0);
        self.index.remove(section.id());
        self.free.push(key.0);
        Some(section)
    }

    pub(crate) fn get_mut(&mut self, key: SectionKey) -> Option<&mut Section> {
        self.arena.get_mut(key.0)?.as_mut()
    }

    pub fn lookup(&self, id: &str) -> Option<&Section> {
        let key = self.index.get(id)?;
        self.arena.get(key.0)?.as_ref()
    }

    /// Full stable sort by weight; runs once at startup
    pub fn sort(&mut self) {
        let mut order = std::mem::take(&mut self.order);
        order.sort_by_key(|&slot| self.weight_of(slot));
        self.order = order;
        self.sorted = true;
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Sections in display order, mutable for the renderer's cache slot
    pub fn snapshot_mut(&mut self) -> Vec<&mut Section> {
        let mut slots: Vec<Option<&mut Section>> =
            self.arena.iter_mut().map(|slot| slot.as_mut()).collect();
        self.order
            .iter()
            .filter_map(|&slot| slots.get_mut(slot).and_then(|s| s.take()))
            .collect()
    }

    /// Sections in display order
    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.order
            .iter()
            .filter_map(move |&slot| self.arena.get(slot).and_then(|s| s.as_ref()))
    }

    /// Ids in display order
    pub fn ids(&self) -> Vec<String> {
        self.iter().map(|s| s.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn weight_of(&self, slot: usize) -> usize {
        self.arena
            .get(slot)
            .and_then(|s| s.as_ref())
            .map(|s| s.weight)
            .unwrap_or(UNLISTED_WEIGHT)
    }
}

impl Default for SectionRegistry {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
