use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{PreferenceChangeListener, PreferencesStore};
use crate::primitives::key_value_store::{PreferencesBackend, PreferencesBackendError};
use crate::primitives::sync::{read, write};

/// Default [`PreferencesStore`]: typed values JSON-encoded into a string backend.
///
/// Every key is stored as `{namespace}/{key}`. Two `Preferences` over the same backend
/// share data but are distinct stores with their own listener lists.
#[derive(uniffi::Object)]
pub struct Preferences {
    backend: Arc<dyn PreferencesBackend>,
    namespace: String,
    listeners: RwLock<Vec<Arc<dyn PreferenceChangeListener>>>,
}

#[uniffi::export]
impl Preferences {
    /// Creates a store over `backend`, prefixing keys with `namespace`.
    #[uniffi::constructor]
    #[must_use]
    pub fn new(backend: Arc<dyn PreferencesBackend>, namespace: String) -> Arc<Self> {
        Arc::new(Self {
            backend,
            namespace,
            listeners: RwLock::new(Vec::new()),
        })
    }

    /// The key namespace of this store.
    #[must_use]
    pub fn namespace(&self) -> String {
        self.namespace.clone()
    }
}

impl Preferences {
    fn backend_key(&self, key: &str) -> String {
        format!("{}/{key}", self.namespace)
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.backend.get(self.backend_key(key)) {
            Ok(raw) => serde_json::from_str(&raw)
                .inspect_err(|e| {
                    crate::debug!("preferences.type_mismatch key={key} error={e}");
                })
                .ok(),
            Err(PreferencesBackendError::KeyNotFound) => None,
            Err(e) => {
                crate::warn!("preferences.read_failed key={key} error={e}");
                None
            }
        }
    }

    fn store<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                crate::error!("preferences.encode_failed key={key} error={e}");
                return;
            }
        };

        match self.backend.set(self.backend_key(key), raw) {
            Ok(()) => self.fire_change(),
            Err(e) => crate::error!("preferences.write_failed key={key} error={e}"),
        }
    }

    /// Invokes every listener outside the listener lock.
    fn fire_change(&self) {
        let listeners = read(&self.listeners).clone();
        for listener in listeners {
            listener.on_preferences_changed();
        }
    }
}

impl PreferencesStore for Preferences {
    fn bool_with_fallback(&self, key: String, fallback: bool) -> bool {
        self.load(&key).unwrap_or(fallback)
    }

    fn set_bool(&self, key: String, value: bool) {
        self.store(&key, &value);
    }

    fn int_with_fallback(&self, key: String, fallback: i64) -> i64 {
        self.load(&key).unwrap_or(fallback)
    }

    fn set_int(&self, key: String, value: i64) {
        self.store(&key, &value);
    }

    fn float_with_fallback(&self, key: String, fallback: f64) -> f64 {
        self.load(&key).unwrap_or(fallback)
    }

    fn set_float(&self, key: String, value: f64) {
        self.store(&key, &value);
    }

    fn string_with_fallback(&self, key: String, fallback: String) -> String {
        self.load(&key).unwrap_or(fallback)
    }

    fn set_string(&self, key: String, value: String) {
        self.store(&key, &value);
    }

    fn string_list(&self, key: String) -> Vec<String> {
        self.load(&key).unwrap_or_default()
    }

    fn set_string_list(&self, key: String, value: Vec<String>) {
        self.store(&key, &value);
    }

    fn remove_value(&self, key: String) {
        match self.backend.delete(self.backend_key(&key)) {
            Ok(()) => self.fire_change(),
            Err(PreferencesBackendError::KeyNotFound) => {}
            Err(e) => crate::error!("preferences.remove_failed key={key} error={e}"),
        }
    }

    fn add_change_listener(&self, listener: Arc<dyn PreferenceChangeListener>) {
        write(&self.listeners).push(listener);
    }

    fn change_listeners(&self) -> Vec<Arc<dyn PreferenceChangeListener>> {
        read(&self.listeners).clone()
    }
}

impl std::fmt::Debug for Preferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preferences")
            .field("namespace", &self.namespace)
            .field("listener_count", &read(&self.listeners).len())
            .finish_non_exhaustive()
    }
}
