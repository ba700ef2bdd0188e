//! Test utilities for unit tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tokio::sync::broadcast;

use crate::app::{CloudProvider, CloudProviderError, TransitionReport};
use crate::primitives::logger::{set_logger, LogLevel, Logger};
use crate::primitives::PreferencesBackend;

/// Logger that keeps every message, installed once per test binary.
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
    /// Messages mentioning `needle`
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

/// Returns the process-wide capturing logger, installing it on first use.
pub fn captured_logs() -> Arc<CapturingLogger> {
    static INSTANCE: OnceLock<Arc<CapturingLogger>> = OnceLock::new();
    Arc::clone(INSTANCE.get_or_init(|| {
        let logger = Arc::new(CapturingLogger::default());
        set_logger(logger.clone());
        logger
    }))
}

/// Scripted cloud provider.
pub struct TestProvider {
    name: String,
    rejection: Option<String>,
    cleanups: AtomicU32,
}

impl TestProvider {
    pub fn succeeding(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            rejection: None,
            cleanups: AtomicU32::new(0),
        })
    }

    pub fn rejecting(name: &str, reason: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            rejection: Some(reason.to_string()),
            cleanups: AtomicU32::new(0),
        })
    }

    pub fn cleanup_count(&self) -> u32 {
        self.cleanups.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CloudProvider for TestProvider {
    fn provider_name(&self) -> String {
        self.name.clone()
    }

    fn provider_description(&self) -> String {
        format!("test provider {}", self.name)
    }

    async fn setup(&self, _app_id: String) -> Result<(), CloudProviderError> {
        tokio::task::yield_now().await;
        match &self.rejection {
            Some(reason) => Err(CloudProviderError::SetupRejected {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn cloud_preferences(&self, _app_id: String) -> Option<Arc<dyn PreferencesBackend>> {
        None
    }

    fn cleanup(&self, _app_id: String) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
    }
}

/// Waits for the next report that ends an attempt.
pub async fn wait_for_terminal(
    receiver: &mut broadcast::Receiver<TransitionReport>,
) -> TransitionReport {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let report = receiver.recv().await.unwrap();
            if report.state.is_terminal() {
                return report;
            }
        }
    })
    .await
    .unwrap()
}
