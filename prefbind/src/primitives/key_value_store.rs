use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;

use super::sync::lock;

/// Errors that can occur when interacting with a preferences backend
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Error, uniffi::Error)]
pub enum PreferencesBackendError {
    /// The requested key was not found in the backend
    #[error("key not found")]
    KeyNotFound,
    /// Failed to parse the value retrieved from the backend
    #[error("failed to parse value")]
    ParsingFailure,
    /// Failed to update the value in the backend
    #[error("failed to update value")]
    UpdateFailure,
    /// An unexpected error occurred in the foreign callback
    #[error("unexpected error in foreign callback: {0}")]
    UnexpectedUniFFICallbackError(String),
}

impl From<uniffi::UnexpectedUniFFICallbackError> for PreferencesBackendError {
    fn from(e: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::UnexpectedUniFFICallbackError(e.reason)
    }
}

/// Persistence behind a [`Preferences`](crate::preferences::Preferences) store.
///
/// Implemented by native code (Android `SharedPreferences`, iOS `UserDefaults`) or by a
/// cloud provider that supplies its own storage. Only strings are stored; the store on top
/// encodes every typed value as JSON.
///
/// Keys arrive already namespaced (`{namespace}/{key}`).
#[uniffi::export(with_foreign)]
pub trait PreferencesBackend: Send + Sync {
    /// Get a value from the backend
    ///
    /// # Errors
    /// - `PreferencesBackendError::KeyNotFound` if the key is not found
    /// - `PreferencesBackendError::ParsingFailure` if something goes wrong while reading the value
    fn get(&self, key: String) -> Result<String, PreferencesBackendError>;

    /// Set a value in the backend
    ///
    /// # Errors
    /// - `PreferencesBackendError::UpdateFailure` if something goes wrong while updating the value
    fn set(&self, key: String, value: String) -> Result<(), PreferencesBackendError>;

    /// Delete a value from the backend
    ///
    /// # Errors
    /// - `PreferencesBackendError::KeyNotFound` if the key is not found
    /// - `PreferencesBackendError::UpdateFailure` if something goes wrong while updating the value
    fn delete(&self, key: String) -> Result<(), PreferencesBackendError>;
}

/// In-memory [`PreferencesBackend`], used when the host does not supply one.
#[derive(Debug, Default, uniffi::Object)]
pub struct InMemoryPreferencesBackend {
    values: Mutex<HashMap<String, String>>,
}

#[uniffi::export]
impl InMemoryPreferencesBackend {
    /// Creates a new empty in-memory backend
    #[uniffi::constructor]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    #[must_use]
    pub fn len(&self) -> u64 {
        lock(&self.values).len() as u64
    }

    /// Whether the backend holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.values).is_empty()
    }
}

impl PreferencesBackend for InMemoryPreferencesBackend {
    fn get(&self, key: String) -> Result<String, PreferencesBackendError> {
        lock(&self.values)
            .get(&key)
            .cloned()
            .ok_or(PreferencesBackendError::KeyNotFound)
    }

    fn set(&self, key: String, value: String) -> Result<(), PreferencesBackendError> {
        lock(&self.values).insert(key, value);
        Ok(())
    }

    fn delete(&self, key: String) -> Result<(), PreferencesBackendError> {
        lock(&self.values)
            .remove(&key)
            .map(|_| ())
            .ok_or(PreferencesBackendError::KeyNotFound)
    }
}
