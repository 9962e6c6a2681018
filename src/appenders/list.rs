//! In-memory appender capturing events for inspection
//!
//! Useful in tests: the captured list is shared through a handle that stays
//! readable after the appender has been moved into a context.

use crate::core::{Appender, LogEvent, LoggerError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type EventList = Arc<Mutex<Vec<LogEvent>>>;

/// Appender storing a copy of every event it receives
///
/// # Example
///
/// ```
/// use rust_async_logger::appenders::ListAppender;
/// use rust_async_logger::core::Appender;
///
/// let list = ListAppender::new("captured");
/// let events = list.events_handle();
/// assert!(events.lock().is_empty());
/// assert_eq!(list.name(), "captured");
/// ```
pub struct ListAppender {
    name: String,
    events: EventList,
    fail_every: Option<u64>,
    appended: u64,
    delay: Option<Duration>,
}

impl ListAppender {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: Arc::new(Mutex::new(Vec::new())),
            fail_every: None,
            appended: 0,
            delay: None,
        }
    }

    /// Shared view of the captured events
    pub fn events_handle(&self) -> EventList {
        Arc::clone(&self.events)
    }

    /// Return an error for every `n`th event instead of capturing it
    #[must_use]
    pub fn failing_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }

    /// Sleep before capturing each event, simulating a slow sink
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Wait until at least `count` events were captured
    ///
    /// Returns `false` if `timeout` elapses first.
    pub fn wait_for(events: &EventList, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while events.lock().len() < count {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }
}

impl Appender for ListAppender {
    fn append(&mut self, event: &LogEvent) -> Result<()> {
        self.appended += 1;
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if let Some(n) = self.fail_every {
            if self.appended % n == 0 {
                return Err(LoggerError::appender(
                    &self.name,
                    format!("configured failure on event {}", self.appended),
                ));
            }
        }
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
