//! Log event record
//!
//! A [`LogEvent`] is pre-allocated inside the ring buffer and reused in
//! place. The message text buffer keeps its capacity across reuse, and the
//! context snapshots, logger name and thread name are shared `Arc`s, so
//! populating a slot does not allocate in steady state.

use super::log_context::{ContextMap, ContextStack};
use super::log_level::LogLevel;
use std::fmt::{self, Write as _};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Message text stored when the message's `Display` returns an error
pub const MESSAGE_FORMAT_FAILED: &str = "<message formatting failed>";

/// Message text stored when the message's `Display` panics
pub const MESSAGE_FORMAT_PANICKED: &str = "<message formatting panicked>";

/// Error value attached to an event; shared so it outlives the call site
pub type Thrown = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Optional tag attached to an event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Marker(Arc<str>);

impl Marker {
    pub fn new(name: impl AsRef<str>) -> Self {
        Marker(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Call-site location, captured only when the context includes locations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
    pub module_path: Option<&'static str>,
}

impl SourceLocation {
    /// Location of the caller of the enclosing `#[track_caller]` function
    #[track_caller]
    #[inline]
    pub fn caller() -> Self {
        let location = std::panic::Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
            module_path: None,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.module_path {
            Some(module) => write!(f, "{}({}:{})", module, self.file, self.line),
            None => write!(f, "{}:{}", self.file, self.line),
        }
    }
}

/// One log event's full snapshot
#[derive(Clone)]
pub struct LogEvent {
    pub(crate) logger_name: Arc<str>,
    pub(crate) level: LogLevel,
    pub(crate) message: String,
    pub(crate) thrown: Option<Thrown>,
    pub(crate) context_map: ContextMap,
    pub(crate) context_stack: ContextStack,
    pub(crate) thread_name: Arc<str>,
    pub(crate) thread_id: u64,
    pub(crate) timestamp: i64,
    pub(crate) source: Option<SourceLocation>,
    pub(crate) marker: Option<Marker>,
    pub(crate) populated: bool,
}

impl LogEvent {
    /// Empty slot value used to pre-fill the ring buffer
    pub fn empty() -> Self {
        Self {
            logger_name: Arc::from(""),
            level: LogLevel::Info,
            message: String::new(),
            thrown: None,
            context_map: ContextMap::default(),
            context_stack: ContextStack::default(),
            thread_name: Arc::from(""),
            thread_id: 0,
            timestamp: 0,
            source: None,
            marker: None,
            populated: false,
        }
    }

    /// Render `message` into the reusable text buffer
    ///
    /// Runs between claiming and publishing a slot. A panicking `Display`
    /// is contained and replaced by a placeholder so the claimed sequence
    /// is still published.
    pub(crate) fn set_message(&mut self, message: &dyn fmt::Display) {
        self.message.clear();
        let buffer = &mut self.message;
        let rendered = catch_unwind(AssertUnwindSafe(|| write!(buffer, "{}", message)));
        let placeholder = match rendered {
            Ok(Ok(())) => return,
            // Writing into a String only fails if the Display impl itself errors
            Ok(Err(_)) => MESSAGE_FORMAT_FAILED,
            Err(_) => MESSAGE_FORMAT_PANICKED,
        };
        self.message.clear();
        self.message.push_str(placeholder);
    }

    /// Drop references held by a processed slot, keeping buffer capacity
    pub(crate) fn clear(&mut self) {
        self.message.clear();
        self.thrown = None;
        self.context_map = ContextMap::default();
        self.context_stack = ContextStack::default();
        self.source = None;
        self.marker = None;
        self.populated = false;
    }

    pub fn logger_name(&self) -> &str {
        &self.logger_name
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn thrown(&self) -> Option<&Thrown> {
        self.thrown.as_ref()
    }

    pub fn context_map(&self) -> &ContextMap {
        &self.context_map
    }

    pub fn context_stack(&self) -> &ContextStack {
        &self.context_stack
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }

    /// Milliseconds since the Unix epoch, taken on the producer thread
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn source(&self) -> Option<&SourceLocation> {
        self.source.as_ref()
    }

    pub fn marker(&self) -> Option<&Marker> {
        self.marker.as_ref()
    }

    pub fn is_populated(&self) -> bool {
        self.populated
    }
}

impl Default for LogEvent {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogEvent")
            .field("logger_name", &self.logger_name)
            .field("level", &self.level)
            .field("message", &self.message)
            .field("thrown", &self.thrown.as_ref().map(|e| e.to_string()))
            .field("context_map", &self.context_map)
            .field("context_stack", &self.context_stack)
            .field("thread_name", &self.thread_name)
            .field("timestamp", &self.timestamp)
            .field("source", &self.source)
            .field("marker", &self.marker)
            .finish()
    }
}
