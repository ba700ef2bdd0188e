//! Preference stores
//!
//! A preference store is a mutable key/value container that announces every change to
//! its registered listeners. Stores are compared by **identity**: two stores holding the
//! same values are still different stores, which is what lets the binding registry tell
//! an outgoing store from its replacement while both are alive.
//!
//! - [`PreferencesStore`]: the store contract, exported to foreign code as a trait interface
//! - [`Preferences`]: the default store, encoding values as JSON in a [`PreferencesBackend`](crate::primitives::PreferencesBackend)
//! - [`StoreSlot`]: the single "current store" slot owned by an application

use std::fmt;
use std::sync::Arc;

mod slot;
mod store;

pub use slot::StoreSlot;
pub use store::Preferences;

/// Callback invoked after any value of a store changes.
///
/// Implemented by native code or, on the Rust side, through [`listener_fn`].
#[uniffi::export(with_foreign)]
pub trait PreferenceChangeListener: Send + Sync {
    /// Called with no details; listeners re-read whatever they care about.
    fn on_preferences_changed(&self);
}

/// A [`PreferenceChangeListener`] backed by a Rust closure.
pub struct ChangeListenerFn {
    callback: Box<dyn Fn() + Send + Sync>,
}

impl PreferenceChangeListener for ChangeListenerFn {
    fn on_preferences_changed(&self) {
        (self.callback)();
    }
}

impl fmt::Debug for ChangeListenerFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeListenerFn").finish_non_exhaustive()
    }
}

/// Wraps a closure as a change listener.
///
/// ```rust
/// use prefbind::preferences::{listener_fn, Preferences, PreferencesStore};
/// use prefbind::primitives::InMemoryPreferencesBackend;
/// use std::sync::Arc;
///
/// let store = Preferences::new(Arc::new(InMemoryPreferencesBackend::new()), "demo".into());
/// store.add_change_listener(listener_fn(|| println!("changed")));
/// store.set_bool("dark_mode".into(), true);
/// ```
pub fn listener_fn(callback: impl Fn() + Send + Sync + 'static) -> Arc<dyn PreferenceChangeListener> {
    Arc::new(ChangeListenerFn {
        callback: Box::new(callback),
    })
}

/// A mutable key/value preference container with change notification.
///
/// Getters never fail: a missing key, or a value stored with another type, yields the
/// fallback. Every successful write or removal invokes each registered listener once,
/// after the value is visible to readers.
#[uniffi::export]
pub trait PreferencesStore: Send + Sync {
    /// Reads a boolean, or `fallback` when absent.
    fn bool_with_fallback(&self, key: String, fallback: bool) -> bool;
    /// Stores a boolean.
    fn set_bool(&self, key: String, value: bool);

    /// Reads an integer, or `fallback` when absent.
    fn int_with_fallback(&self, key: String, fallback: i64) -> i64;
    /// Stores an integer.
    fn set_int(&self, key: String, value: i64);

    /// Reads a float, or `fallback` when absent.
    fn float_with_fallback(&self, key: String, fallback: f64) -> f64;
    /// Stores a float.
    fn set_float(&self, key: String, value: f64);

    /// Reads a string, or `fallback` when absent.
    fn string_with_fallback(&self, key: String, fallback: String) -> String;
    /// Stores a string.
    fn set_string(&self, key: String, value: String);

    /// Reads a list of strings, empty when absent.
    fn string_list(&self, key: String) -> Vec<String>;
    /// Stores a list of strings.
    fn set_string_list(&self, key: String, value: Vec<String>);

    /// Removes a key. Listeners fire only if the key existed.
    fn remove_value(&self, key: String);

    /// Registers a listener. The same listener may be registered more than once.
    fn add_change_listener(&self, listener: Arc<dyn PreferenceChangeListener>);

    /// Snapshot of the registered listeners, in registration order.
    fn change_listeners(&self) -> Vec<Arc<dyn PreferenceChangeListener>>;
}

/// Identity of a store allocation, usable as a map key.
///
/// Only meaningful while the store is alive; holders pair it with a `Weak` handle to
/// detect address reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreId(usize);

impl StoreId {
    /// Identity of the given store handle.
    #[must_use]
    pub fn of(store: &Arc<dyn PreferencesStore>) -> Self {
        Self(Arc::as_ptr(store).cast::<()>() as usize)
    }
}

/// Whether two handles point at the same store instance.
#[must_use]
pub fn same_store(a: &Arc<dyn PreferencesStore>, b: &Arc<dyn PreferencesStore>) -> bool {
    StoreId::of(a) == StoreId::of(b)
}
