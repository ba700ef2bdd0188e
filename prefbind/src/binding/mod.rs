//! Observable preference bindings
//!
//! A [`PreferenceBinding`] observes one key in one store. Bindings are kept in a
//! per-store [`PreferenceBindings`] set, and the [`PreferenceRegistry`] maps each store
//! (by identity) to its set.
//!
//! When the application's current store is replaced, the registry notices the new
//! identity on the next lookup and migrates the old set: every
//! [`BoundItem::Retargetable`] item is pointed at the new store, then every item
//! re-checks its value once.
//!
//! ```rust
//! use prefbind::binding::PreferenceRegistry;
//! use prefbind::preferences::{Preferences, PreferencesStore, StoreSlot};
//! use prefbind::primitives::InMemoryPreferencesBackend;
//! use std::sync::Arc;
//!
//! let store: Arc<dyn PreferencesStore> =
//!     Preferences::new(Arc::new(InMemoryPreferencesBackend::new()), "demo".into());
//! let registry = PreferenceRegistry::new(Arc::new(StoreSlot::new(Arc::clone(&store))));
//!
//! let dark_mode = registry.bind::<bool>("dark_mode", &store);
//! let _subscription = dark_mode.subscribe(|on| println!("dark mode: {on}"));
//! store.set_bool("dark_mode".into(), true);
//! assert!(dark_mode.get());
//! ```

mod item;
mod registry;
mod set;
mod typed;
mod value;

pub use item::{BoundItem, PreferenceItem, RetargetablePreferenceItem};
pub use registry::PreferenceRegistry;
pub use set::PreferenceBindings;
pub use typed::{PreferenceBinding, Subscription};
pub use value::PreferenceValue;
