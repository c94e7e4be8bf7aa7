//! Progress reporting for the stitch worker

use super::WorkerEvent;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::mpsc::SyncSender;

/// Default number of progress steps
pub const DEFAULT_PROGRESS_TOTAL: u32 = 100;

#[derive(Debug)]
struct ProgressState {
    value: u32,
    text: String,
}

/// Progress sink handed to the stitcher
///
/// Every update is forwarded to the UI thread as [`WorkerEvent::Progress`].
/// Clones report into the same progress bar.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    events: SyncSender<WorkerEvent>,
    total: u32,
    state: Arc<Mutex<ProgressState>>,
}

impl ProgressReporter {
    /// Create a reporter counting up to `total`
    pub fn new(events: SyncSender<WorkerEvent>, total: u32) -> Self {
        Self {
            events,
            total: total.max(1),
            state: Arc::new(Mutex::new(ProgressState {
                value: 0,
                text: String::new(),
            })),
        }
    }

    /// Value meaning "done"
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Current value
    pub fn value(&self) -> u32 {
        self.state.lock().value
    }

    /// Current progress bar text
    pub fn text(&self) -> String {
        self.state.lock().text.clone()
    }

    /// Reset to zero with the "started" text
    pub fn start(&self) {
        self.update(0, Some("started"));
    }

    /// Set the value, and the text when `message` is non-empty
    ///
    /// Values past the total are clamped.
    pub fn update(&self, value: u32, message: Option<&str>) {
        let event = {
            let mut state = self.state.lock();
            state.value = value.min(self.total);
            if let Some(message) = message.filter(|m| !m.is_empty()) {
                state.text = message.to_string();
            }
            WorkerEvent::Progress {
                value: state.value,
                total: self.total,
                message: state.text.clone(),
            }
        };
        // The UI may already be gone during shutdown
        let _ = self.events.send(event);
    }

    /// Change the text without moving the bar
    pub fn set_message(&self, message: &str) {
        let value = self.value();
        self.update(value, Some(message));
    }

    /// Jump to the total with the "completed" text
    pub fn finish(&self) {
        self.update(self.total, Some("completed"));
    }
}
