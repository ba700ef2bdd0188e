use std::cell::RefCell;

thread_local! {
    static LOG_CONTEXT: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// A scope guard that sets a logging context and restores the previous one when dropped.
///
/// The context is thread-local, so do not hold a `LogContext` across an `.await`.
///
/// # Examples
///
/// ```rust
/// use prefbind::primitives::logger::LogContext;
///
/// {
///     let _ctx = LogContext::new("PreferenceRegistry");
///     prefbind::info!("This will be prefixed with [PreferenceRegistry]");
/// } // Context restored here
/// ```
pub struct LogContext {
    previous: Option<String>,
}

impl LogContext {
    /// Creates a new logging context scope.
    #[must_use]
    pub fn new(module: &str) -> Self {
        let previous = LOG_CONTEXT.with(|ctx| {
            let mut ctx = ctx.borrow_mut();
            let prev = ctx.clone();
            *ctx = Some(format!("[{module}]"));
            prev
        });

        Self { previous }
    }
}

impl Drop for LogContext {
    fn drop(&mut self) {
        LOG_CONTEXT.with(|ctx| {
            (*ctx.borrow_mut()).clone_from(&self.previous);
        });
    }
}

/// Gets the current logging context, if any.
#[must_use]
pub fn get_context() -> Option<String> {
    LOG_CONTEXT.with(|ctx| ctx.borrow().clone())
}

/// Macro to create a scoped logging context.
///
/// # Examples
///
/// ```rust
/// use prefbind::with_log_context;
///
/// with_log_context!("Preferences" => {
///     prefbind::debug!("This will be prefixed with [Preferences]");
/// });
/// ```
#[macro_export]
macro_rules! with_log_context {
    ($module:expr => $block:block) => {{
        let _ctx = $crate::primitives::logger::LogContext::new($module);
        $block
    }};
}
