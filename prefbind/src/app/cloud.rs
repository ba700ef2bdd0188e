use std::sync::Arc;

use crate::primitives::PreferencesBackend;

/// A cloud service that can take over an application's preferences.
///
/// Implemented by native code. Installing a provider on a
/// [`PreferencesApp`](super::PreferencesApp) runs [`setup`](Self::setup) in the
/// background; only once that succeeds does the provider become active and its storage
/// (or a fresh default store) replace the current preferences.
///
/// # Examples
///
/// ## Kotlin
///
/// ```kotlin
/// class DriveProvider(private val drive: DriveClient) : CloudProvider {
///     override fun providerName() = "drive"
///     override fun providerDescription() = "Sync preferences through Drive"
///
///     override suspend fun setup(appId: String) {
///         if (!drive.signIn(appId)) throw CloudProviderException.SetupRejected("sign-in cancelled")
///     }
///
///     override fun cloudPreferences(appId: String): PreferencesBackend? = DriveBackend(drive, appId)
///     override fun cleanup(appId: String) = drive.signOut()
/// }
/// ```
#[uniffi::export(with_foreign)]
#[async_trait::async_trait]
pub trait CloudProvider: Send + Sync {
    /// Short unique name, used in diagnostics.
    fn provider_name(&self) -> String;

    /// Human readable description.
    fn provider_description(&self) -> String;

    /// Prepares the provider for the application identified by `app_id`.
    ///
    /// # Errors
    ///
    /// * `CloudProviderError::SetupRejected` - The service or the user declined
    /// * `CloudProviderError::Unreachable` - The service could not be contacted
    /// * `CloudProviderError::Generic` - Anything else
    async fn setup(&self, app_id: String) -> Result<(), CloudProviderError>;

    /// The provider's own preference storage, if it has one. When `None` the
    /// application builds a fresh default store instead.
    fn cloud_preferences(&self, app_id: String) -> Option<Arc<dyn PreferencesBackend>>;

    /// Releases whatever `setup` acquired. Called once the provider stops being active.
    fn cleanup(&self, app_id: String);
}

/// Errors a [`CloudProvider`] reports from `setup`.
#[crate::prefbind_error]
pub enum CloudProviderError {
    /// The provider refused to set up
    #[error("Setup rejected: {reason}")]
    SetupRejected {
        /// Why the setup was rejected
        reason: String,
    },
    /// The provider's service could not be reached
    #[error("Service unreachable: {reason}")]
    Unreachable {
        /// Transport level detail
        reason: String,
    },
}

/// Required for foreign trait support: unexpected native exceptions thrown from `setup`
/// arrive as this error instead of panicking.
impl From<uniffi::UnexpectedUniFFICallbackError> for CloudProviderError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::Generic {
            message: error.reason,
        }
    }
}
