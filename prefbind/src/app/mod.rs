//! The application object
//!
//! [`PreferencesApp`] owns the one "current preferences store" slot of an application.
//! Everything else only reads that slot: the [`PreferenceRegistry`] compares identities
//! against it to detect a replaced store, and callers fetch the store through
//! [`PreferencesApp::preferences`].
//!
//! The store is replaced by installing a [`CloudProvider`]. Installation is
//! fire-and-forget: the provider's `setup` runs on a background task and its outcome is
//! only visible through the logger and [`PreferencesApp::subscribe_transitions`].

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use chrono::Utc;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::broadcast;

mod cloud;
mod settings;
mod transition;

pub use cloud::{CloudProvider, CloudProviderError};
pub use settings::{AppSettings, SettingsListener};
pub use transition::{TransitionReport, TransitionState};

use crate::binding::{PreferenceBinding, PreferenceRegistry, PreferenceValue};
use crate::preferences::{Preferences, PreferencesStore, StoreSlot};
use crate::primitives::sync::{read, write};
use crate::primitives::{AppConfig, InMemoryPreferencesBackend, PreferencesBackend};

const TRANSITION_REPORT_CAPACITY: usize = 64;

/// Errors creating a [`PreferencesApp`].
#[crate::prefbind_error]
pub enum AppError {
    /// No tokio runtime was running and none could be started
    #[error("Task runtime unavailable: {reason}")]
    RuntimeUnavailable {
        /// The I/O error from building the runtime
        reason: String,
    },
}

/// Where provider transitions are spawned.
enum TaskRuntime {
    /// The runtime the app was created in.
    Shared(Handle),
    /// A runtime started for this app. `None` only while dropping.
    Owned(Option<Runtime>),
}

impl TaskRuntime {
    fn acquire() -> Result<Self, AppError> {
        if let Ok(handle) = Handle::try_current() {
            return Ok(Self::Shared(handle));
        }

        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("prefbind-transition")
            .enable_time()
            .build()
            .map(|runtime| Self::Owned(Some(runtime)))
            .map_err(|e| AppError::RuntimeUnavailable {
                reason: e.to_string(),
            })
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self {
            Self::Shared(handle) => {
                handle.spawn(task);
            }
            Self::Owned(Some(runtime)) => {
                runtime.spawn(task);
            }
            Self::Owned(None) => {}
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::Shared(_) => "shared",
            Self::Owned(_) => "owned",
        }
    }
}

impl Drop for TaskRuntime {
    fn drop(&mut self) {
        // The last app handle may be released on one of the runtime's own workers, where a
        // blocking shutdown would panic
        if let Self::Owned(runtime) = self {
            if let Some(runtime) = runtime.take() {
                runtime.shutdown_background();
            }
        }
    }
}

/// An application with replaceable preference storage.
///
/// # Examples
///
/// ```rust
/// use prefbind::app::PreferencesApp;
/// use prefbind::primitives::AppConfig;
///
/// let app = PreferencesApp::new(AppConfig::with_id("com.example.notes"), None).unwrap();
/// let font_size = app.binding::<i64>("font_size");
/// font_size.set(14);
/// assert_eq!(app.preferences().int_with_fallback("font_size".into(), 12), 14);
/// ```
///
/// ## Swift
///
/// ```swift
/// let app = try PreferencesApp(
///     config: AppConfig(uniqueId: "com.example.notes", storageNamespace: nil),
///     backend: UserDefaultsBackend()
/// )
/// app.installProvider(provider: ICloudProvider())
/// ```
#[derive(uniffi::Object)]
pub struct PreferencesApp {
    config: AppConfig,
    placeholder_id: OnceLock<String>,
    default_backend: Arc<dyn PreferencesBackend>,
    preferences: Arc<StoreSlot>,
    registry: Arc<PreferenceRegistry>,
    settings: Arc<AppSettings>,
    cloud: RwLock<Option<Arc<dyn CloudProvider>>>,
    runtime: TaskRuntime,
    transitions: broadcast::Sender<TransitionReport>,
    attempts: AtomicU64,
}

#[crate::prefbind_export]
impl PreferencesApp {
    /// Creates an application.
    ///
    /// `backend` stores the default preferences; without one, values live in memory
    /// only. Transitions run on the tokio runtime this is called from, or on a runtime
    /// owned by the app when called outside one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::RuntimeUnavailable` if a runtime was needed and could not be
    /// started.
    #[uniffi::constructor]
    pub fn new(
        config: AppConfig,
        backend: Option<Arc<dyn PreferencesBackend>>,
    ) -> Result<Arc<Self>, AppError> {
        let runtime = TaskRuntime::acquire()?;
        let default_backend: Arc<dyn PreferencesBackend> =
            backend.unwrap_or_else(|| Arc::new(InMemoryPreferencesBackend::new()));
        let (transitions, _) = broadcast::channel(TRANSITION_REPORT_CAPACITY);

        let placeholder_id = OnceLock::new();
        let namespace = config.namespace_for(&resolve_unique_id(&config, &placeholder_id));
        let preferences = Arc::new(StoreSlot::new(Preferences::new(
            Arc::clone(&default_backend),
            namespace,
        )));

        let app = Arc::new(Self {
            config,
            placeholder_id,
            default_backend,
            registry: PreferenceRegistry::new(Arc::clone(&preferences)),
            preferences,
            settings: AppSettings::new(),
            cloud: RwLock::new(None),
            runtime,
            transitions,
            attempts: AtomicU64::new(0),
        });

        crate::info!(
            "app.created unique_id={} namespace={} runtime={} timestamp={}",
            app.unique_id(),
            app.storage_namespace(),
            app.runtime.kind(),
            Utc::now().to_rfc3339()
        );
        Ok(app)
    }

    /// The application's unique id.
    ///
    /// When none was configured a placeholder `missing-id-<unix seconds>` is generated on
    /// first use, with a warning, and returned from then on.
    pub fn unique_id(&self) -> String {
        resolve_unique_id(&self.config, &self.placeholder_id)
    }

    /// The current preferences store.
    pub fn preferences(&self) -> Arc<dyn PreferencesStore> {
        if !self.config.has_unique_id() {
            crate::warn!(
                "app.missing_unique_id message=\"Preferences require a unique id, set AppConfig.unique_id\""
            );
        }
        self.preferences.current()
    }

    /// The settings hook.
    pub fn settings(&self) -> Arc<AppSettings> {
        Arc::clone(&self.settings)
    }

    /// Name of the active cloud provider, if any.
    pub fn cloud_provider_name(&self) -> Option<String> {
        let provider = read(&self.cloud).clone();
        provider.map(|provider| provider.provider_name())
    }

    /// Installs a cloud provider, or clears the active one with `None`.
    ///
    /// Clearing is immediate and calls `cleanup` on the cleared provider. Installing
    /// returns at once; the provider's `setup` and the store replacement run on a
    /// background task. A failed setup is logged and leaves the app unchanged.
    pub fn install_provider(self: Arc<Self>, provider: Option<Arc<dyn CloudProvider>>) {
        let Some(provider) = provider else {
            if let Some(previous) = self.swap_provider(None) {
                crate::info!(
                    "provider.cleared timestamp={}",
                    Utc::now().to_rfc3339()
                );
                previous.cleanup(self.unique_id());
            }
            return;
        };

        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let task = Arc::clone(&self).transition_provider(provider, attempt);
        self.runtime.spawn(task);
    }
}

impl PreferencesApp {
    /// The registry tracking bindings of this app's stores.
    #[must_use]
    pub fn registry(&self) -> Arc<PreferenceRegistry> {
        Arc::clone(&self.registry)
    }

    /// A typed binding for `key` in the current store.
    ///
    /// The binding follows the app across provider transitions.
    #[must_use]
    pub fn binding<T: PreferenceValue>(&self, key: &str) -> Arc<PreferenceBinding<T>> {
        self.registry.bind::<T>(key, &self.preferences.current())
    }

    /// Receiver for every state change of every provider transition started after this
    /// call.
    #[must_use]
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<TransitionReport> {
        self.transitions.subscribe()
    }

    /// A fresh store over the app's default backend.
    #[must_use]
    pub fn new_default_preferences(&self) -> Arc<dyn PreferencesStore> {
        Preferences::new(Arc::clone(&self.default_backend), self.storage_namespace())
    }

    fn storage_namespace(&self) -> String {
        self.config.namespace_for(&self.unique_id())
    }

    /// Sets the active provider and returns the previous one.
    fn swap_provider(
        &self,
        provider: Option<Arc<dyn CloudProvider>>,
    ) -> Option<Arc<dyn CloudProvider>> {
        std::mem::replace(&mut *write(&self.cloud), provider)
    }
}

/// The configured unique id, or the placeholder generated on first call.
fn resolve_unique_id(config: &AppConfig, placeholder_id: &OnceLock<String>) -> String {
    if config.has_unique_id() {
        return config.unique_id.clone();
    }

    placeholder_id
        .get_or_init(|| {
            crate::warn!(
                "app.missing_unique_id message=\"Preferences require a unique id, set AppConfig.unique_id\""
            );
            format!("missing-id-{}", Utc::now().timestamp())
        })
        .clone()
}

impl std::fmt::Debug for PreferencesApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferencesApp")
            .field("config", &self.config)
            .field("preferences", &self.preferences)
            .field("cloud_provider", &self.cloud_provider_name())
            .field("runtime", &self.runtime.kind())
            .finish_non_exhaustive()
    }
}
