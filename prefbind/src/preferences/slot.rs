use std::sync::{Arc, RwLock};

use super::{same_store, PreferencesStore};
use crate::primitives::sync::{read, write};

/// The application's single "current preferences store".
///
/// Owned by the application, which is the only writer. Other components (the binding
/// registry) hold a shared reference to read it and compare identities against it.
pub struct StoreSlot {
    current: RwLock<Arc<dyn PreferencesStore>>,
}

impl StoreSlot {
    /// Creates a slot holding `store`.
    #[must_use]
    pub fn new(store: Arc<dyn PreferencesStore>) -> Self {
        Self {
            current: RwLock::new(store),
        }
    }

    /// The current store.
    #[must_use]
    pub fn current(&self) -> Arc<dyn PreferencesStore> {
        Arc::clone(&read(&self.current))
    }

    /// Whether `store` is the current store instance.
    #[must_use]
    pub fn is_current(&self, store: &Arc<dyn PreferencesStore>) -> bool {
        same_store(&read(&self.current), store)
    }

    /// Installs a new current store and returns the previous one.
    pub(crate) fn replace(&self, store: Arc<dyn PreferencesStore>) -> Arc<dyn PreferencesStore> {
        std::mem::replace(&mut *write(&self.current), store)
    }
}

impl std::fmt::Debug for StoreSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSlot")
            .field("current", &super::StoreId::of(&read(&self.current)))
            .finish()
    }
}
