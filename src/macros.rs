//! Logging macros for ergonomic log message formatting.
//!
//! These macros accept `println!`-style arguments. The message is passed to
//! the logger as `format_args!`, so nothing is formatted on the calling
//! thread beyond writing into the ring buffer slot, and nothing at all when
//! the level is filtered out. The calling module is recorded as the event's
//! location module when the context captures locations.
//!
//! # Examples
//!
//! ```
//! use rust_async_logger::prelude::*;
//! use rust_async_logger::info;
//!
//! let context = LoggerContext::builder().build();
//! context.start().unwrap();
//! let logger = context.logger("server");
//!
//! // Basic logging
//! info!(logger, "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//!
//! context.stop(DEFAULT_SHUTDOWN_TIMEOUT);
//! ```

/// Log a message with automatic formatting.
///
/// Publishing errors (the context was stopped) are ignored; use
/// [`Logger::try_log`](crate::Logger::try_log) to observe them.
///
/// # Examples
///
/// ```
/// # use rust_async_logger::prelude::*;
/// # let context = LoggerContext::builder().build();
/// # let logger = context.logger("doc");
/// use rust_async_logger::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        let _ = $logger.__log_from(module_path!(), $level, format_args!($($arg)+));
    }};
}

/// Log a trace-level message.
///
/// # Examples
///
/// ```
/// # use rust_async_logger::prelude::*;
/// # let context = LoggerContext::builder().min_level(LogLevel::Trace).build();
/// # let logger = context.logger("doc");
/// use rust_async_logger::trace;
/// trace!(logger, "Entering function: calculate()");
/// trace!(logger, "Variable value: {}", 42);
/// ```
#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Trace, $($arg)+)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
///
/// # Examples
///
/// ```
/// # use rust_async_logger::prelude::*;
/// # let context = LoggerContext::builder().build();
/// # let logger = context.logger("doc");
/// use rust_async_logger::info;
/// info!(logger, "Application started");
/// info!(logger, "Processing {} items", 100);
/// ```
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```
/// # use rust_async_logger::prelude::*;
/// # let context = LoggerContext::builder().build();
/// # let logger = context.logger("doc");
/// use rust_async_logger::error;
/// error!(logger, "Failed to connect to database");
/// error!(logger, "Error code: {}, message: {}", 500, "Internal error");
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a fatal-level message.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Fatal, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use crate::appenders::ListAppender;
    use crate::core::status::{StatusLevel, StatusLogger};
    use crate::core::{LogLevel, LoggerContext};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_macros_publish_formatted_messages() {
        let list = ListAppender::new("list");
        let events = list.events_handle();
        let context = LoggerContext::builder()
            .status_logger(Arc::new(
                StatusLogger::new().with_print_level(StatusLevel::Error),
            ))
            .min_level(LogLevel::Trace)
            .include_location(true)
            .appender(list)
            .build();
        context.start().expect("start");
        let logger = context.logger("macros");

        log!(logger, LogLevel::Info, "Formatted: {}", 42);
        trace!(logger, "Trace message");
        debug!(logger, "Count: {}", 5);
        info!(logger, "Items: {}", 100);
        warn!(logger, "Retry {} of {}", 1, 3);
        error!(logger, "Code: {}", 500);
        fatal!(logger, "Fatal: {}", "disk full");
        assert!(context.stop(Duration::from_secs(5)));

        let captured = events.lock();
        let summary: Vec<(LogLevel, String)> = captured
            .iter()
            .map(|e| (e.level(), e.message().to_string()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (LogLevel::Info, "Formatted: 42".to_string()),
                (LogLevel::Trace, "Trace message".to_string()),
                (LogLevel::Debug, "Count: 5".to_string()),
                (LogLevel::Info, "Items: 100".to_string()),
                (LogLevel::Warn, "Retry 1 of 3".to_string()),
                (LogLevel::Error, "Code: 500".to_string()),
                (LogLevel::Fatal, "Fatal: disk full".to_string()),
            ]
        );
        let source = captured[0].source().expect("location");
        assert_eq!(source.module_path, Some(module_path!()));
        assert!(source.file.ends_with("macros.rs"));
    }

    #[test]
    fn test_macros_on_stopped_context_do_not_panic() {
        let context = LoggerContext::builder()
            .status_logger(Arc::new(
                StatusLogger::new().with_print_level(StatusLevel::Error),
            ))
            .build();
        let logger = context.logger("macros");
        info!(logger, "dropped {}", 1);
        assert_eq!(context.metrics().rejected(), 1);
    }
}
