//! Typed observable bindings over a single preference key.
//!
//! Subscribers are held weakly and handed back as RAII [`Subscription`] guards. Dead
//! entries are pruned lazily on the next notification.

use std::any::Any;
use std::sync::{Arc, Mutex, RwLock, Weak};

use super::item::{PreferenceItem, RetargetablePreferenceItem};
use super::value::PreferenceValue;
use crate::preferences::PreferencesStore;
use crate::primitives::sync::{lock, read, write};

type CallbackArc<T> = Arc<dyn Fn(&T) + Send + Sync>;
type CallbackWeak<T> = Weak<dyn Fn(&T) + Send + Sync>;

/// An observable binding of one key in one store.
///
/// # Invariants
///
/// 1. Subscribers fire only when the value read from the store differs from the last
///    snapshot, and exactly once per such difference.
/// 2. Subscribers are notified in registration order, outside every internal lock.
/// 3. Re-targeting keeps subscribers and the snapshot; the next check compares the new
///    store's value against the old snapshot.
pub struct PreferenceBinding<T: PreferenceValue> {
    key: String,
    store: RwLock<Arc<dyn PreferencesStore>>,
    snapshot: Mutex<T>,
    subscribers: Mutex<Vec<CallbackWeak<T>>>,
}

impl<T: PreferenceValue> PreferenceBinding<T> {
    /// Creates a binding snapshotting the current value of `key` in `store`.
    ///
    /// Use [`PreferenceRegistry::bind`](super::PreferenceRegistry::bind) to get a binding
    /// that is kept in sync with store changes and migrations.
    #[must_use]
    pub fn new(key: impl Into<String>, store: Arc<dyn PreferencesStore>) -> Arc<Self> {
        let key = key.into();
        let snapshot = T::load(store.as_ref(), &key);
        Arc::new(Self {
            key,
            store: RwLock::new(store),
            snapshot: Mutex::new(snapshot),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// The bound key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The store currently read from and written to.
    #[must_use]
    pub fn store(&self) -> Arc<dyn PreferencesStore> {
        Arc::clone(&read(&self.store))
    }

    /// Reads the value from the store.
    #[must_use]
    pub fn get(&self) -> T {
        let store = self.store();
        T::load(store.as_ref(), &self.key)
    }

    /// Writes `value` to the store, then announces it if it differs from the snapshot.
    pub fn set(&self, value: T) {
        let store = self.store();
        T::save(store.as_ref(), &self.key, &value);
        self.check_for_change();
    }

    /// Subscribes to value changes. Dropping the returned guard unsubscribes.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let strong: CallbackArc<T> = Arc::new(callback);
        lock(&self.subscribers).push(Arc::downgrade(&strong));
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Registered subscribers, including dropped ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    fn notify(&self, value: &T) {
        let callbacks: Vec<CallbackArc<T>> = {
            let mut subscribers = lock(&self.subscribers);
            subscribers.retain(|w| w.strong_count() > 0);
            subscribers.iter().filter_map(Weak::upgrade).collect()
        };

        for callback in &callbacks {
            callback(value);
        }
    }
}

impl<T: PreferenceValue> PreferenceItem for PreferenceBinding<T> {
    fn key(&self) -> &str {
        &self.key
    }

    fn check_for_change(&self) {
        let changed = {
            let mut snapshot = lock(&self.snapshot);
            let current = self.get();
            if *snapshot == current {
                None
            } else {
                *snapshot = current.clone();
                Some(current)
            }
        };

        if let Some(value) = changed {
            self.notify(&value);
        }
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl<T: PreferenceValue> RetargetablePreferenceItem for PreferenceBinding<T> {
    fn replace_provider(&self, store: Arc<dyn PreferencesStore>) {
        *write(&self.store) = store;
    }
}

impl<T: PreferenceValue> std::fmt::Debug for PreferenceBinding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceBinding")
            .field("key", &self.key)
            .field("snapshot", &*lock(&self.snapshot))
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// RAII guard for a binding subscriber.
///
/// Dropping it drops the only strong reference to the callback, so the binding's weak
/// entry stops upgrading from then on.
pub struct Subscription {
    _guard: Box<dyn Any + Send + Sync>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
