/// Backend key-value storage implemented by native code.
pub mod key_value_store;

/// Application configuration.
pub mod config;

/// Logging bridge to the host application's logger.
pub mod logger;

pub(crate) mod sync;

pub use config::AppConfig;
pub use key_value_store::{InMemoryPreferencesBackend, PreferencesBackend, PreferencesBackendError};
