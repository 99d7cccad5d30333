//! User-facing activity log.
//!
//! Entries are kept newest-first in a bounded buffer and published through a
//! `watch` channel so dashboards can render the latest lines. Every entry is
//! also mirrored into `tracing` at the matching level.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Subsystem an entry originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogSource {
    System,
    Telegram,
    Bluetooth,
    Server,
}

impl LogSource {
    pub fn as_str(self) -> &'static str {
        match self {
            LogSource::System => "SYSTEM",
            LogSource::Telegram => "TELEGRAM",
            LogSource::Bluetooth => "BLUETOOTH",
            LogSource::Server => "SERVER",
        }
    }
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of an entry. `Success` is an `Info` that reads as good news.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single line of the activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    pub source: LogSource,
    pub level: LogLevel,
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    pub fn new(source: LogSource, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source,
            level,
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let local = self.timestamp.with_timezone(&Local);
        write!(
            f,
            "[{}] [{}] {}: {}",
            local.format("%H:%M:%S"),
            self.source,
            self.level,
            self.message
        )
    }
}

/// Bounded, observable, newest-first log.
pub struct ActivityLog {
    entries: watch::Sender<VecDeque<LogEntry>>,
    capacity: usize,
}

impl ActivityLog {
    /// Capacity used when the config does not set one.
    pub const DEFAULT_CAPACITY: usize = 500;

    /// Create a log holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (entries, _) = watch::channel(VecDeque::new());
        Self {
            entries,
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert an entry at the front, evicting the oldest past capacity.
    pub fn add(&self, entry: LogEntry) {
        match entry.level {
            LogLevel::Error => error!(source = %entry.source, "{}", entry.message),
            LogLevel::Warning => warn!(source = %entry.source, "{}", entry.message),
            LogLevel::Info | LogLevel::Success => {
                info!(source = %entry.source, level = %entry.level, "{}", entry.message);
            }
        }

        let capacity = self.capacity;
        self.entries.send_modify(|entries| {
            entries.push_front(entry);
            entries.truncate(capacity);
        });
    }

    pub fn log(&self, source: LogSource, level: LogLevel, message: impl Into<String>) {
        self.add(LogEntry::new(source, level, message));
    }

    pub fn info(&self, source: LogSource, message: impl Into<String>) {
        self.log(source, LogLevel::Info, message);
    }

    pub fn success(&self, source: LogSource, message: impl Into<String>) {
        self.log(source, LogLevel::Success, message);
    }

    pub fn warning(&self, source: LogSource, message: impl Into<String>) {
        self.log(source, LogLevel::Warning, message);
    }

    pub fn error(&self, source: LogSource, message: impl Into<String>) {
        self.log(source, LogLevel::Error, message);
    }

    /// The `n` most recent entries, newest first.
    pub fn recent(&self, n: usize) -> Vec<LogEntry> {
        self.entries.borrow().iter().take(n).cloned().collect()
    }

    /// A copy of every stored entry, newest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.borrow().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.send_modify(VecDeque::clear);
    }

    /// Observe the log. The receiver sees each change as a whole snapshot.
    pub fn subscribe(&self) -> watch::Receiver<VecDeque<LogEntry>> {
        self.entries.subscribe()
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl fmt::Debug for ActivityLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityLog")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
