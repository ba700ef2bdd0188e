use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;

use super::cloud::CloudProvider;
use super::PreferencesApp;
use crate::preferences::{Preferences, PreferencesStore};

/// Steps of one provider transition attempt.
///
/// `Idle -> SettingUp -> Failed`, or on success
/// `Idle -> SettingUp -> Installed -> ListenersMigrated -> SettingsRefreshed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, uniffi::Enum)]
pub enum TransitionState {
    /// Not started
    Idle,
    /// Waiting on the provider's `setup`
    SettingUp,
    /// `setup` failed; nothing was changed
    Failed,
    /// The provider is active and its store is the application's current store
    Installed,
    /// Listeners of the previous store were moved to the new one and invoked
    ListenersMigrated,
    /// Settings listeners fired; the transition is complete
    SettingsRefreshed,
}

impl TransitionState {
    /// Whether the attempt is over.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::SettingsRefreshed)
    }

    /// Whether `next` is a legal successor of this state.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::SettingUp)
                | (Self::SettingUp, Self::Failed | Self::Installed)
                | (Self::Installed, Self::ListenersMigrated)
                | (Self::ListenersMigrated, Self::SettingsRefreshed)
        )
    }
}

/// One state change of one transition attempt.
///
/// Published on the channel returned by
/// [`PreferencesApp::subscribe_transitions`](super::PreferencesApp::subscribe_transitions).
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct TransitionReport {
    /// Sequence number of the attempt, starting at 1 per application
    pub attempt: u64,
    /// Name of the provider being installed
    pub provider_name: String,
    /// State just entered
    pub state: TransitionState,
}

/// Tracks the state of one attempt and publishes every change.
struct Transition {
    attempt: u64,
    provider_name: String,
    state: TransitionState,
    reports: broadcast::Sender<TransitionReport>,
}

impl Transition {
    const fn new(
        attempt: u64,
        provider_name: String,
        reports: broadcast::Sender<TransitionReport>,
    ) -> Self {
        Self {
            attempt,
            provider_name,
            state: TransitionState::Idle,
            reports,
        }
    }

    fn advance(&mut self, next: TransitionState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {:?} -> {next:?}",
            self.state
        );
        self.state = next;

        // Fails only when nobody subscribed
        let _ = self.reports.send(TransitionReport {
            attempt: self.attempt,
            provider_name: self.provider_name.clone(),
            state: next,
        });
    }
}

impl PreferencesApp {
    /// Body of the background task spawned by `install_provider`.
    ///
    /// A failed `setup` is logged once and ends the attempt without touching the
    /// application. Overlapping attempts are not serialised; the last one to install
    /// its store wins.
    pub(super) async fn transition_provider(
        self: Arc<Self>,
        provider: Arc<dyn CloudProvider>,
        attempt: u64,
    ) {
        let started = Utc::now();
        let mut transition =
            Transition::new(attempt, provider.provider_name(), self.transitions.clone());

        crate::info!(
            "provider_transition.started attempt={} timestamp={}",
            attempt,
            started.to_rfc3339()
        );
        transition.advance(TransitionState::SettingUp);

        let app_id = self.unique_id();
        if let Err(e) = provider.setup(app_id.clone()).await {
            crate::error!(
                "provider_transition.failed attempt={} provider={} error={} timestamp={}",
                attempt,
                transition.provider_name,
                e,
                Utc::now().to_rfc3339()
            );
            transition.advance(TransitionState::Failed);
            return;
        }

        let previous_provider = self.swap_provider(Some(Arc::clone(&provider)));

        let old_store = self.preferences.current();
        let listeners = old_store.change_listeners();
        let new_store: Arc<dyn PreferencesStore> =
            match provider.cloud_preferences(app_id.clone()) {
                Some(backend) => Preferences::new(backend, self.storage_namespace()),
                None => self.new_default_preferences(),
            };
        self.preferences.replace(Arc::clone(&new_store));
        transition.advance(TransitionState::Installed);

        // The previous provider's store is no longer current here
        if let Some(previous) = previous_provider.filter(|p| !Arc::ptr_eq(p, &provider)) {
            previous.cleanup(app_id);
        }

        // The store was replaced, so every listener may observe different values
        for listener in &listeners {
            new_store.add_change_listener(Arc::clone(listener));
            listener.on_preferences_changed();
        }
        transition.advance(TransitionState::ListenersMigrated);

        self.settings.apply();
        transition.advance(TransitionState::SettingsRefreshed);

        crate::info!(
            "provider_transition.completed attempt={} provider={} listeners={} duration_ms={} timestamp={}",
            attempt,
            transition.provider_name,
            listeners.len(),
            (Utc::now() - started).num_milliseconds(),
            Utc::now().to_rfc3339()
        );
    }
}
