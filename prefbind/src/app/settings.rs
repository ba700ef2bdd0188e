use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::primitives::sync::{read, write};

/// Receives a call every time application settings are re-applied.
#[uniffi::export(with_foreign)]
pub trait SettingsListener: Send + Sync {
    /// Settings may have changed; re-read what you depend on.
    fn on_settings_changed(&self);
}

/// Application-wide settings hook.
///
/// A successful provider transition ends by calling [`apply`](Self::apply), so anything
/// derived from preferences (themes, scale) gets recomputed against the new store.
#[derive(uniffi::Object)]
pub struct AppSettings {
    listeners: RwLock<Vec<Arc<dyn SettingsListener>>>,
    applied: AtomicU64,
}

#[crate::prefbind_export]
impl AppSettings {
    /// Creates settings with no listeners.
    #[uniffi::constructor]
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            listeners: RwLock::new(Vec::new()),
            applied: AtomicU64::new(0),
        })
    }

    /// Registers a listener for [`apply`](Self::apply).
    pub fn add_change_listener(&self, listener: Arc<dyn SettingsListener>) {
        write(&self.listeners).push(listener);
    }

    /// Fires every listener once, in registration order.
    pub fn apply(&self) {
        let listeners = read(&self.listeners).clone();
        let applied = self.applied.fetch_add(1, Ordering::SeqCst) + 1;
        crate::debug!("settings.applied listeners={} count={applied}", listeners.len());

        for listener in listeners {
            listener.on_settings_changed();
        }
    }

    /// How many times settings were applied.
    #[must_use]
    pub fn applied_count(&self) -> u64 {
        self.applied.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for AppSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppSettings")
            .field("listeners", &read(&self.listeners).len())
            .field("applied", &self.applied_count())
            .finish()
    }
}
