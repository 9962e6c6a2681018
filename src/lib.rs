//! # Rust Async Logger
//!
//! Asynchronous logging core built on a pre-allocated ring buffer.
//!
//! ## Features
//!
//! - **Low-latency publishing**: producers snapshot their context, claim a
//!   slot and return; a single consumer thread calls the appenders
//! - **Pluggable waiting**: blocking, timeout, sleeping, yielding and
//!   busy-spin wait strategies
//! - **Cached clocks**: trade bounded timestamp staleness for speed
//! - **Queue-full policies**: wait, write synchronously or discard
//! - **Bounded shutdown**: `stop` drains for at most its timeout
//!
//! ```
//! use rust_async_logger::prelude::*;
//! use rust_async_logger::info;
//!
//! let context = LoggerContext::builder()
//!     .name("app")
//!     .appender(ListAppender::new("captured"))
//!     .build();
//! context.start().unwrap();
//!
//! let logger = context.logger("app::main");
//! ThreadContext::put("request_id", "r-17");
//! info!(logger, "handled {} requests", 3);
//! ThreadContext::clear_all();
//!
//! context.stop(DEFAULT_SHUTDOWN_TIMEOUT);
//! ```

pub mod appenders;
pub mod core;
pub mod macros;

pub mod prelude {
    #[cfg(feature = "console")]
    pub use crate::appenders::ConsoleAppender;
    pub use crate::appenders::ListAppender;
    pub use crate::core::{
        Appender, AsyncLoggerConfig, Clock, ClockKind, ContextMap, ContextStack, DiscardCallback,
        EventRoute, ExceptionHandler, LogEvent, LogLevel, Logger, LoggerContext,
        LoggerContextBuilder, LoggerError, LoggerMetrics, Marker, Property, QueueFullPolicy,
        Result, StatusLogger, ThreadContext, WaitStrategy, WaitStrategyKind,
        DEFAULT_SHUTDOWN_TIMEOUT,
    };
}

#[cfg(feature = "console")]
pub use appenders::ConsoleAppender;
pub use appenders::ListAppender;
pub use core::{
    Appender, AsyncLoggerConfig, Clock, ClockKind, ContextMap, ContextStack, DiscardCallback,
    EventRoute, ExceptionHandler, LogEvent, LogLevel, Logger, LoggerContext, LoggerContextBuilder,
    LoggerError, LoggerMetrics, Marker, Property, QueueFullPolicy, Result, StatusLogger,
    ThreadContext, WaitStrategy, WaitStrategyKind, DEFAULT_SHUTDOWN_TIMEOUT,
};
