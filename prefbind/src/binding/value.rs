use std::fmt::Debug;

use crate::preferences::PreferencesStore;

/// A value type that can be bound to a preference key.
///
/// `load` must return the store's default for the type when the key is absent, so a
/// binding re-targeted to an empty store reads the default rather than failing.
pub trait PreferenceValue: Clone + PartialEq + Debug + Send + Sync + 'static {
    /// Reads the value for `key` from `store`.
    fn load(store: &dyn PreferencesStore, key: &str) -> Self;

    /// Writes `value` for `key` into `store`.
    fn save(store: &dyn PreferencesStore, key: &str, value: &Self);
}

impl PreferenceValue for bool {
    fn load(store: &dyn PreferencesStore, key: &str) -> Self {
        store.bool_with_fallback(key.to_string(), false)
    }

    fn save(store: &dyn PreferencesStore, key: &str, value: &Self) {
        store.set_bool(key.to_string(), *value);
    }
}

impl PreferenceValue for i64 {
    fn load(store: &dyn PreferencesStore, key: &str) -> Self {
        store.int_with_fallback(key.to_string(), 0)
    }

    fn save(store: &dyn PreferencesStore, key: &str, value: &Self) {
        store.set_int(key.to_string(), *value);
    }
}

impl PreferenceValue for f64 {
    fn load(store: &dyn PreferencesStore, key: &str) -> Self {
        store.float_with_fallback(key.to_string(), 0.0)
    }

    fn save(store: &dyn PreferencesStore, key: &str, value: &Self) {
        store.set_float(key.to_string(), *value);
    }
}

impl PreferenceValue for String {
    fn load(store: &dyn PreferencesStore, key: &str) -> Self {
        store.string_with_fallback(key.to_string(), Self::new())
    }

    fn save(store: &dyn PreferencesStore, key: &str, value: &Self) {
        store.set_string(key.to_string(), value.clone());
    }
}

impl PreferenceValue for Vec<String> {
    fn load(store: &dyn PreferencesStore, key: &str) -> Self {
        store.string_list(key.to_string())
    }

    fn save(store: &dyn PreferencesStore, key: &str, value: &Self) {
        store.set_string_list(key.to_string(), value.clone());
    }
}
