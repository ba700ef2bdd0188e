use std::collections::HashMap;
use std::sync::RwLock;

use super::item::BoundItem;
use crate::primitives::sync::{read, write};

/// Per-store bookkeeping: preference key to bound item.
///
/// Each set carries its own lock so notifying one store's bindings never blocks
/// lookups on another store's.
#[derive(Debug, Default)]
pub struct PreferenceBindings {
    items: RwLock<HashMap<String, BoundItem>>,
}

impl PreferenceBindings {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The item registered for `key`, if any.
    #[must_use]
    pub fn get_item(&self, key: &str) -> Option<BoundItem> {
        read(&self.items).get(key).cloned()
    }

    /// Snapshot of every item, in no particular order.
    #[must_use]
    pub fn list(&self) -> Vec<BoundItem> {
        read(&self.items).values().cloned().collect()
    }

    /// Registers `item` under its key, replacing any previous item for that key.
    pub fn set_item(&self, item: BoundItem) {
        write(&self.items).insert(item.key().to_string(), item);
    }

    /// Returns the existing item for `key` if `accept` takes it, otherwise registers the
    /// item built by `create`. Check and insert happen under one write lock.
    pub fn get_or_insert_with<T>(
        &self,
        key: &str,
        accept: impl FnOnce(&BoundItem) -> Option<T>,
        create: impl FnOnce() -> (BoundItem, T),
    ) -> T {
        let mut items = write(&self.items);
        if let Some(found) = items.get(key).and_then(accept) {
            return found;
        }
        let (item, value) = create();
        items.insert(key.to_string(), item);
        value
    }

    /// Moves every item of `other` whose key is not present here into this set.
    pub(crate) fn absorb_missing(&self, other: &Self) {
        let incoming = other.list();
        let mut items = write(&self.items);
        for item in incoming {
            items.entry(item.key().to_string()).or_insert(item);
        }
    }

    /// Number of registered items.
    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.items).len()
    }

    /// Whether no item is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        read(&self.items).is_empty()
    }
}
