//! Progress reporting and cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Receives human-readable status lines during ingestion
pub type ProgressCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Optional progress sink; a missing callback is a no-op
#[derive(Default)]
pub struct Progress {
    callback: Option<ProgressCallback>,
}

impl Progress {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self { callback }
    }

    pub fn report(&self, message: &str) {
        debug!("progress: {}", message);
        if let Some(callback) = &self.callback {
            callback(message);
        }
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("attached", &self.callback.is_some())
            .finish()
    }
}

/// Shared flag checked before each download batch
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_progress_without_sink_is_noop() {
        Progress::default().report("Fetching file tree...");
    }

    #[test]
    fn test_progress_forwards_messages() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress = Progress::new(Some(Box::new(move |message: &str| {
            sink.lock().unwrap().push(message.to_string());
        })));

        progress.report("Checking repository access...");
        progress.report("Fetching file tree...");
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["Checking repository access...", "Fetching file tree..."]
        );
    }

    #[test]
    fn test_cancellation_is_shared_between_clones() {
        let flag = CancellationFlag::new();
        let handle = flag.clone();
        assert!(!flag.is_cancelled());
        handle.cancel();
        assert!(flag.is_cancelled());
    }
}
