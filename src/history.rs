//! Record of finished dictations.
//!
//! The pipeline appends a [`HistoryEntry`] for every transcription that
//! produced text and attaches a copy to the completion event, so a frontend
//! can show "what did I just say" without re-querying anything.
//!
//! [`MemoryHistory`] is a bounded in-memory sink: newest first, oldest
//! evicted past capacity.  Persistence belongs to whoever embeds the crate.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default number of entries [`MemoryHistory`] keeps before evicting.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

// ---------------------------------------------------------------------------
// HistoryEntry
// ---------------------------------------------------------------------------

/// One finished dictation.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// Completion time as Unix milliseconds.
    pub timestamp_ms: u64,
    /// The delivered transcript.
    pub text: String,
    /// Whitespace-separated word count of `text`.
    pub word_count: usize,
    /// Length of the recording in seconds, after trimming.
    pub duration_secs: f32,
    /// Model the recognizer ran with.
    pub model: String,
}

impl HistoryEntry {
    /// Build an entry stamped with the current time; the word count is
    /// derived from `text`.
    pub fn new(text: impl Into<String>, duration_secs: f32, model: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            timestamp_ms: unix_millis(),
            word_count: text.split_whitespace().count(),
            text,
            duration_secs,
            model: model.into(),
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// HistorySink trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe destination for finished dictations.
pub trait HistorySink: Send + Sync {
    /// Append one entry.
    fn record(&self, entry: HistoryEntry);

    /// Up to `limit` most recent entries, newest first.
    fn recent(&self, limit: usize) -> Vec<HistoryEntry>;

    /// Number of entries currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Compile-time assertion: Box<dyn HistorySink> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn HistorySink>) {}
};

// ---------------------------------------------------------------------------
// MemoryHistory
// ---------------------------------------------------------------------------

/// Bounded in-memory history, newest entries first.
#[derive(Debug)]
pub struct MemoryHistory {
    entries: Mutex<VecDeque<HistoryEntry>>,
    capacity: usize,
}

impl MemoryHistory {
    /// Sink that holds at most `capacity` entries; a zero capacity keeps
    /// nothing but still accepts calls.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity,
        }
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistorySink for MemoryHistory {
    fn record(&self, entry: HistoryEntry) {
        let mut entries = self.entries.lock().unwrap();
        entries.push_front(entry);
        while entries.len() > self.capacity {
            entries.pop_back();
        }
    }

    fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        let entries = self.entries.lock().unwrap();
        entries.iter().take(limit).cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
