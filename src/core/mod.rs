//! Core logger types and traits

pub mod appender;
pub mod clock;
pub mod config;
pub mod error;
pub mod log_context;
pub mod log_event;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod processor;
pub mod property;
pub(crate) mod publisher;
pub mod queue_full_policy;
pub mod ring_buffer;
pub mod status;
pub mod wait_strategy;

pub use appender::Appender;
pub use clock::{
    create_clock, CachedClock, Clock, ClockKind, CoarseCachedClock, SystemClock,
    CACHED_CLOCK_REFRESH_INTERVAL,
};
pub use config::AsyncLoggerConfig;
pub use error::{LoggerError, Result};
pub use log_context::{
    ContextGuard, ContextMap, ContextProvider, ContextStack, StackGuard, ThreadContext,
    ThreadContextProvider,
};
pub use log_event::{
    LogEvent, Marker, SourceLocation, Thrown, MESSAGE_FORMAT_FAILED, MESSAGE_FORMAT_PANICKED,
};
pub use log_level::LogLevel;
pub use logger::{Logger, LoggerContext, LoggerContextBuilder, DEFAULT_SHUTDOWN_TIMEOUT};
pub use metrics::LoggerMetrics;
pub use processor::{
    resolve_exception_handler, DefaultExceptionHandler, ExceptionHandler, IgnoreExceptionHandler,
};
pub use property::Property;
pub use queue_full_policy::{
    resolve_queue_full_policy, DiscardCallback, EventRoute, QueueFullPolicy,
};
pub use ring_buffer::{
    calculate_ring_buffer_size, RingBuffer, DEFAULT_RING_BUFFER_SIZE, MAX_RING_BUFFER_SIZE,
    MIN_RING_BUFFER_SIZE,
};
pub use status::{StatusData, StatusLevel, StatusLogger};
pub use wait_strategy::{
    create_wait_strategy, resolve_wait_strategy_kind, BlockingWaitStrategy, BusySpinWaitStrategy,
    SleepingWaitStrategy, TimeoutBlockingWaitStrategy, WaitOutcome, WaitStrategy,
    WaitStrategyKind, WaitStrategyParams, YieldingWaitStrategy,
};
