/// Configuration for a [`PreferencesApp`](crate::app::PreferencesApp).
///
/// # Examples
///
/// ## Swift
///
/// ```swift
/// let config = AppConfig(uniqueId: "com.example.notes", storageNamespace: nil)
/// let app = try PreferencesApp(config: config, backend: UserDefaultsBackend())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, uniffi::Record)]
pub struct AppConfig {
    /// Stable application identifier (reverse-DNS). Empty means "not configured"; the
    /// app then runs with a generated placeholder.
    pub unique_id: String,
    /// Prefix for every backend key written by the app's stores. Defaults to the unique id.
    pub storage_namespace: Option<String>,
}

impl AppConfig {
    /// Creates a configuration with the given unique id and the default namespace.
    #[must_use]
    pub fn with_id(unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            storage_namespace: None,
        }
    }

    /// Whether a unique id was configured.
    #[must_use]
    pub fn has_unique_id(&self) -> bool {
        !self.unique_id.trim().is_empty()
    }

    /// The namespace to use for backend keys, given the resolved unique id.
    #[must_use]
    pub fn namespace_for(&self, resolved_unique_id: &str) -> String {
        self.storage_namespace
            .as_deref()
            .filter(|namespace| !namespace.is_empty())
            .unwrap_or(resolved_unique_id)
            .to_string()
    }
}
