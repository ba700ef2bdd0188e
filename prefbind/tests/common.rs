#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tokio::sync::broadcast;

use prefbind::app::{CloudProvider, CloudProviderError, TransitionReport};
use prefbind::binding::{PreferenceBinding, PreferenceValue, Subscription};
use prefbind::preferences::PreferenceChangeListener;
use prefbind::primitives::logger::{set_logger, LogLevel, Logger};
use prefbind::primitives::PreferencesBackend;

/// Logger keeping every message for later inspection.
#[derive(Default)]
pub struct CapturingLogger {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl Logger for CapturingLogger {
    fn log(&self, level: LogLevel, message: String) {
        self.entries.lock().unwrap().push((level, message));
    }
}

impl CapturingLogger {
    pub fn entries_containing(&self, needle: &str) -> Vec<(LogLevel, String)> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, message)| message.contains(needle))
            .cloned()
            .collect()
    }
}

/// The capturing logger of this test binary, installed on first use.
pub fn captured_logs() -> Arc<CapturingLogger> {
    static INSTANCE: OnceLock<Arc<CapturingLogger>> = OnceLock::new();
    Arc::clone(INSTANCE.get_or_init(|| {
        let logger = Arc::new(CapturingLogger::default());
        set_logger(logger.clone());
        logger
    }))
}

/// Cloud provider with a scripted `setup` outcome.
pub struct ScriptedProvider {
    name: String,
    rejection: Option<String>,
    backend: Option<Arc<dyn PreferencesBackend>>,
    setup_calls: AtomicU32,
    cleanups: AtomicU32,
}

impl ScriptedProvider {
    fn build(
        name: &str,
        rejection: Option<String>,
        backend: Option<Arc<dyn PreferencesBackend>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            rejection,
            backend,
            setup_calls: AtomicU32::new(0),
            cleanups: AtomicU32::new(0),
        })
    }

    /// Succeeds and lets the app build a default store.
    pub fn without_storage(name: &str) -> Arc<Self> {
        Self::build(name, None, None)
    }

    /// Succeeds and supplies its own backend.
    pub fn with_storage(name: &str, backend: Arc<dyn PreferencesBackend>) -> Arc<Self> {
        Self::build(name, None, Some(backend))
    }

    /// Fails `setup` with `SetupRejected`.
    pub fn rejecting(name: &str, reason: &str) -> Arc<Self> {
        Self::build(name, Some(reason.to_string()), None)
    }

    pub fn setup_calls(&self) -> u32 {
        self.setup_calls.load(Ordering::SeqCst)
    }

    pub fn cleanups(&self) -> u32 {
        self.cleanups.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CloudProvider for ScriptedProvider {
    fn provider_name(&self) -> String {
        self.name.clone()
    }

    fn provider_description(&self) -> String {
        format!("scripted provider {}", self.name)
    }

    async fn setup(&self, _app_id: String) -> Result<(), CloudProviderError> {
        self.setup_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        match &self.rejection {
            Some(reason) => Err(CloudProviderError::SetupRejected {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn cloud_preferences(&self, _app_id: String) -> Option<Arc<dyn PreferencesBackend>> {
        self.backend.clone()
    }

    fn cleanup(&self, _app_id: String) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
    }
}

/// Store listener that counts its invocations.
#[derive(Default)]
pub struct CountingListener {
    calls: AtomicU32,
}

impl CountingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PreferenceChangeListener for CountingListener {
    fn on_preferences_changed(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records every value a binding announces.
pub fn record<T: PreferenceValue>(
    binding: &PreferenceBinding<T>,
) -> (Arc<Mutex<Vec<T>>>, Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let subscription = binding.subscribe(move |value: &T| {
        seen_clone.lock().unwrap().push(value.clone());
    });
    (seen, subscription)
}

/// Waits for the next report that ends an attempt.
pub async fn wait_for_terminal(
    receiver: &mut broadcast::Receiver<TransitionReport>,
) -> TransitionReport {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let report = receiver.recv().await.expect("transition channel closed");
            if report.state.is_terminal() {
                return report;
            }
        }
    })
    .await
    .expect("transition did not finish in time")
}

/// Collects every report up to and including the next terminal one.
pub async fn collect_attempt(
    receiver: &mut broadcast::Receiver<TransitionReport>,
) -> Vec<TransitionReport> {
    tokio::time::timeout(Duration::from_secs(5), async {
        let mut reports = Vec::new();
        loop {
            let report = receiver.recv().await.expect("transition channel closed");
            let done = report.state.is_terminal();
            reports.push(report);
            if done {
                return reports;
            }
        }
    })
    .await
    .expect("transition did not finish in time")
}
