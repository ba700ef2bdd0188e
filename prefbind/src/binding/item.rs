use std::any::Any;
use std::sync::Arc;

use crate::preferences::PreferencesStore;

/// An entry in a [`PreferenceBindings`](super::PreferenceBindings) set.
pub trait PreferenceItem: Send + Sync {
    /// The preference key this item observes.
    fn key(&self) -> &str;

    /// Compares the store's current value with the last snapshot and, if it differs,
    /// updates the snapshot and notifies subscribers exactly once.
    fn check_for_change(&self);

    /// Type-erased handle, used to recover the concrete binding type.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// An item that can be moved onto another store while keeping its subscribers.
pub trait RetargetablePreferenceItem: PreferenceItem {
    /// Reads and writes against `store` from now on.
    ///
    /// Runs while the registry's table is locked; implementations must not call back
    /// into the registry.
    fn replace_provider(&self, store: Arc<dyn PreferencesStore>);
}

/// A registered item together with its re-targeting capability.
///
/// Migration re-targets `Retargetable` items to the new store; `Fixed` items stay on
/// the store they were built for and only take part in the notification sweep.
#[derive(Clone)]
pub enum BoundItem {
    /// Follows the application store across migrations.
    Retargetable(Arc<dyn RetargetablePreferenceItem>),
    /// Bound to one store for its whole life.
    Fixed(Arc<dyn PreferenceItem>),
}

impl BoundItem {
    /// The observed key.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Retargetable(item) => item.key(),
            Self::Fixed(item) => item.key(),
        }
    }

    /// See [`PreferenceItem::check_for_change`].
    pub fn check_for_change(&self) {
        match self {
            Self::Retargetable(item) => item.check_for_change(),
            Self::Fixed(item) => item.check_for_change(),
        }
    }

    /// Re-targets the item if it supports it. Returns whether it did.
    pub fn replace_provider(&self, store: &Arc<dyn PreferencesStore>) -> bool {
        match self {
            Self::Retargetable(item) => {
                item.replace_provider(Arc::clone(store));
                true
            }
            Self::Fixed(_) => false,
        }
    }

    /// Type-erased handle to the underlying item.
    #[must_use]
    pub fn into_any(self) -> Arc<dyn Any + Send + Sync> {
        match self {
            Self::Retargetable(item) => item.into_any(),
            Self::Fixed(item) => item.into_any(),
        }
    }
}

impl std::fmt::Debug for BoundItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Retargetable(item) => f.debug_tuple("Retargetable").field(&item.key()).finish(),
            Self::Fixed(item) => f.debug_tuple("Fixed").field(&item.key()).finish(),
        }
    }
}
