//! Appender trait for log output destinations
//!
//! Appenders receive fully populated events from the consumer thread, or
//! from a producer thread when an event is routed synchronously. Errors and
//! panics are caught by the caller and routed to the context's exception
//! handler.

use super::{error::Result, log_event::LogEvent};

pub trait Appender: Send {
    fn append(&mut self, event: &LogEvent) -> Result<()>;

    /// Called at the end of each consumed batch and when the consumer idles
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str;
}
