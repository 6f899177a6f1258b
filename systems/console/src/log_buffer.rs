//! Bounded, append-only store of console log lines.

use std::collections::VecDeque;

use sandmod_core::{LogEntry, LogSink, Severity};
use tracing::{debug, error, info, warn};

/// Ring buffer holding the most recent console entries.
///
/// Once the buffer holds `capacity` entries every push evicts the oldest
/// one. Each mutation bumps a revision counter that displays compare against
/// to decide whether a redraw is due.
#[derive(Clone, Debug)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    revision: u64,
    pushed: u64,
}

impl LogBuffer {
    /// Creates an empty buffer retaining at most `capacity` entries.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            revision: 0,
            pushed: 0,
        }
    }

    /// Appends an entry stamped with the current time, evicting on overflow.
    pub fn push(&mut self, message: impl Into<String>, severity: Severity) {
        let entry = LogEntry::now(message, severity);
        mirror(&entry);
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            let _ = self.entries.pop_front();
        }
        self.revision = self.revision.wrapping_add(1);
        self.pushed = self.pushed.saturating_add(1);
    }

    /// Discards every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.revision = self.revision.wrapping_add(1);
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &LogEntry> + ExactSizeIterator {
        self.entries.iter()
    }

    /// Number of entries ever pushed, including evicted and cleared ones.
    #[must_use]
    pub const fn pushed(&self) -> u64 {
        self.pushed
    }

    /// Retained entries pushed after the first `mark` pushes.
    ///
    /// Pair with [`LogBuffer::pushed`] to stream only lines not yet shown.
    pub fn since(&self, mark: u64) -> impl Iterator<Item = &LogEntry> {
        let unseen = self.pushed.saturating_sub(mark);
        let unseen = usize::try_from(unseen).unwrap_or(usize::MAX);
        let skip = self.entries.len().saturating_sub(unseen);
        self.entries.iter().skip(skip)
    }

    /// Most recently recorded entry.
    #[must_use]
    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of retained entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Counter bumped on every mutation.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }
}

impl LogSink for LogBuffer {
    fn log(&mut self, message: String, severity: Severity) {
        self.push(message, severity);
    }
}

fn mirror(entry: &LogEntry) {
    let message = entry.message.as_str();
    match entry.severity {
        Severity::Error => error!(target: "console", "{message}"),
        Severity::Warning => warn!(target: "console", "{message}"),
        Severity::Info | Severity::Success => info!(target: "console", "{message}"),
        Severity::System | Severity::Command => debug!(target: "console", "{message}"),
    }
}
