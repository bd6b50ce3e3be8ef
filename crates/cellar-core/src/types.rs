use chrono::{DateTime, Local, Utc};
use std::collections::VecDeque;

/// Entries kept per message or status log before the oldest is evicted.
pub const LOG_CAPACITY: usize = 300;

/// Number of distinct nick colors; `Tone::Nick` slots are below this.
pub const NICK_PALETTE_SIZE: u8 = 12;

/// How a log entry is colored when rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tone {
    Plain,
    /// A line I sent.
    Own,
    /// A channel message, colored by a palette slot derived from the sender.
    Nick(u8),
    /// A message mentioning me.
    Highlight,
    Notice,
    Join,
    Part,
    /// Moderation events: kicks, bans, operator changes.
    Audit,
    Error,
}

/// One line in a message or status log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub sender: Option<String>,
    pub text: String,
    pub tone: Tone,
    /// Set when the entry should ring the terminal bell.
    pub alert: bool,
}

impl LogEntry {
    pub fn message(sender: impl Into<String>, text: impl Into<String>, tone: Tone) -> Self {
        Self {
            timestamp: Utc::now(),
            sender: Some(sender.into()),
            text: text.into(),
            tone,
            alert: false,
        }
    }

    pub fn notice(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            timestamp: Utc::now(),
            sender: None,
            text: text.into(),
            tone,
            alert: false,
        }
    }

    #[must_use]
    pub fn with_alert(mut self) -> Self {
        self.alert = true;
        self
    }

    pub fn local_time(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%H:%M")
            .to_string()
    }
}

/// FIFO log that evicts its oldest entry once full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Default for BoundedLog {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundedLog {
    pub fn new() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, returning the evicted one if the log was full.
    pub fn push(&mut self, entry: LogEntry) -> Option<LogEntry> {
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &LogEntry> + ExactSizeIterator {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
