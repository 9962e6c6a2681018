//! Side-channel status log for the logging system's own diagnostics
//!
//! Configuration fallbacks, shutdown timeouts and appender failures are
//! reported here instead of through the event path. Entries are kept in a
//! bounded buffer for inspection and, above a print threshold, echoed to
//! stderr in the `[LOGGER WARNING] ...` form.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

/// Default number of retained status entries
pub const DEFAULT_STATUS_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatusLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl StatusLevel {
    fn tag(&self) -> &'static str {
        match self {
            StatusLevel::Trace => "TRACE",
            StatusLevel::Debug => "DEBUG",
            StatusLevel::Info => "INFO",
            StatusLevel::Warn => "WARNING",
            StatusLevel::Error => "ERROR",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => StatusLevel::Trace,
            1 => StatusLevel::Debug,
            2 => StatusLevel::Info,
            3 => StatusLevel::Warn,
            _ => StatusLevel::Error,
        }
    }
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A single status record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusData {
    pub level: StatusLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for StatusData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[LOGGER {}] {}", self.level, self.message)
    }
}

/// Bounded, thread-safe status log
///
/// # Example
///
/// ```
/// use rust_async_logger::core::{StatusLevel, StatusLogger};
///
/// let status = StatusLogger::new().with_print_level(StatusLevel::Error);
/// status.warn("ring buffer size 10 below minimum, using 128");
/// assert!(status.contains(StatusLevel::Warn, "below minimum"));
/// ```
#[derive(Debug)]
pub struct StatusLogger {
    entries: Mutex<VecDeque<StatusData>>,
    capacity: usize,
    print_level: AtomicU8,
}

impl StatusLogger {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_STATUS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_STATUS_CAPACITY))),
            capacity: capacity.max(1),
            print_level: AtomicU8::new(StatusLevel::Warn as u8),
        }
    }

    /// Process-wide default used when a context is not given its own
    pub fn global() -> Arc<StatusLogger> {
        static GLOBAL: OnceLock<Arc<StatusLogger>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(StatusLogger::new())))
    }

    /// Set the minimum level echoed to stderr
    #[must_use]
    pub fn with_print_level(self, level: StatusLevel) -> Self {
        self.set_print_level(level);
        self
    }

    pub fn set_print_level(&self, level: StatusLevel) {
        self.print_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn print_level(&self) -> StatusLevel {
        StatusLevel::from_u8(self.print_level.load(Ordering::Relaxed))
    }

    pub fn log(&self, level: StatusLevel, message: impl Into<String>) {
        let data = StatusData {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        };
        if level >= self.print_level() {
            eprintln!("{}", data);
        }
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(data);
    }

    #[inline]
    pub fn trace(&self, message: impl Into<String>) {
        self.log(StatusLevel::Trace, message);
    }

    #[inline]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(StatusLevel::Debug, message);
    }

    #[inline]
    pub fn info(&self, message: impl Into<String>) {
        self.log(StatusLevel::Info, message);
    }

    #[inline]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(StatusLevel::Warn, message);
    }

    #[inline]
    pub fn error(&self, message: impl Into<String>) {
        self.log(StatusLevel::Error, message);
    }

    /// Snapshot of the retained entries, oldest first
    pub fn entries(&self) -> Vec<StatusData> {
        self.entries.lock().iter().cloned().collect()
    }

    /// True if an entry at `level` contains `needle`
    pub fn contains(&self, level: StatusLevel, needle: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|e| e.level == level && e.message.contains(needle))
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for StatusLogger {
    fn default() -> Self {
        Self::new()
    }
}
