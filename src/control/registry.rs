//! Media set registry.
//!
//! Ordered, duplicate-free list of media identifiers. Mutations report the
//! index they touched so the state machine can fix up its cursor without
//! searching again.

use super::MediaItem;

/// Effect of a registry mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryEffect {
    Inserted(usize),
    Removed(usize),
    Unchanged,
}

/// Ordered set of media items, unique by identifier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaSet {
    items: Vec<MediaItem>,
}

impl MediaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `item` unless it is already present
    pub fn add(&mut self, item: MediaItem) -> RegistryEffect {
        if self.contains(&item) {
            tracing::debug!("Ignoring duplicate add for {}", item);
            return RegistryEffect::Unchanged;
        }

        self.items.push(item);
        RegistryEffect::Inserted(self.items.len() - 1)
    }

    /// Remove `item` if present
    ///
    /// Unknown items are tolerated; a stale watch event is not an error.
    pub fn remove(&mut self, item: &MediaItem) -> RegistryEffect {
        match self.position(item) {
            Some(index) => {
                self.items.remove(index);
                RegistryEffect::Removed(index)
            }
            None => {
                tracing::debug!("Ignoring remove for unknown item {}", item);
                RegistryEffect::Unchanged
            }
        }
    }

    pub fn position(&self, item: &MediaItem) -> Option<usize> {
        self.items.iter().position(|i| i == item)
    }

    pub fn contains(&self, item: &MediaItem) -> bool {
        self.position(item).is_some()
    }

    pub fn get(&self, index: usize) -> Option<&MediaItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaItem> {
        self.items.iter()
    }
}
