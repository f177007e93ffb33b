/// Sink for user-facing progress and error messages.
///
/// Implementations must return promptly; they are called inline from the
/// provisioning and cleanup sequences.
pub trait Ui: Send + Sync {
    fn say(&self, message: &str);

    fn error(&self, message: &str);
}

/// Writes messages as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingUi;

impl Ui for TracingUi {
    fn say(&self, message: &str) {
        tracing::info!(target: "ub_builder::ui", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "ub_builder::ui", "{message}");
    }
}
