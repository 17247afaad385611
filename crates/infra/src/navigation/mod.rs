//! Navigator implementations for headless hosts

use parking_lot::Mutex;
use tracing::info;
use tripdesk_core::ports::Navigator;

/// Records every forced navigation instead of performing it.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    history: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<String> {
        self.history.lock().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.history.lock().last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        info!(path, "navigating");
        self.history.lock().push(path.to_string());
    }
}
