//! Latest recognized text, shared between the stream and query handlers.

use parking_lot::Mutex;

/// Single-slot holder for the most recent recognition result.
///
/// The streaming worker writes and HTTP handlers read from other tasks, so
/// the string lives behind a mutex and readers only ever get a copy.
#[derive(Debug, Default)]
pub struct RecognizedText {
    slot: Mutex<String>,
}

impl RecognizedText {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached text.
    pub fn set(&self, text: String) {
        *self.slot.lock() = text;
    }

    /// Copy of the cached text; empty before the first recognition.
    pub fn get(&self) -> String {
        self.slot.lock().clone()
    }
}
