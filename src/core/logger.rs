//! Logger context lifecycle and logger handles
//!
//! A [`LoggerContext`] owns one ring buffer, its wait strategy and its
//! consumer thread. [`Logger`] handles are cheap to clone and publish into
//! the context they were created from. Several contexts can coexist in one
//! process.

use super::appender::Appender;
use super::clock::{create_clock, Clock};
use super::config::AsyncLoggerConfig;
use super::error::Result;
use super::log_context::{ContextProvider, ThreadContextProvider};
use super::log_event::{LogEvent, Marker, Thrown};
use super::log_level::LogLevel;
use super::metrics::LoggerMetrics;
use super::processor::{
    resolve_exception_handler, Dispatcher, EventProcessor, ExceptionHandler, ProcessorHandle,
};
use super::property::Property;
use super::publisher::{next_context_id, Publisher, PublisherSettings};
use super::queue_full_policy::{resolve_queue_full_policy, DiscardCallback, QueueFullPolicy};
use super::ring_buffer::{calculate_ring_buffer_size, RingBuffer};
use super::status::StatusLogger;
use super::wait_strategy::{create_wait_strategy, WaitStrategy};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default shutdown timeout for logger cleanup (5 seconds)
///
/// Used when a context is dropped while still running and no other
/// timeout was configured. For custom timeout control, call
/// [`LoggerContext::stop`] explicitly.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest single sleep while waiting for the backlog to drain
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Extra time granted to a halted consumer before it is detached
const JOIN_GRACE_PERIOD: Duration = Duration::from_millis(100);

struct Running {
    ring: Arc<RingBuffer<LogEvent>>,
    processor: ProcessorHandle,
}

struct ContextInner {
    name: Arc<str>,
    id: u64,
    ring_buffer_size: usize,
    wait_strategy: Arc<dyn WaitStrategy>,
    min_level: AtomicU8,
    shutdown_timeout: Duration,
    publisher: Publisher,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<LoggerMetrics>,
    status: Arc<StatusLogger>,
    /// `None` while stopped; swapped out first thing in `stop`
    running: RwLock<Option<Arc<Running>>>,
    /// Serializes `start` and `stop`
    lifecycle: Mutex<()>,
}

impl ContextInner {
    #[inline]
    fn is_enabled(&self, level: LogLevel) -> bool {
        level.as_u8() >= self.min_level.load(Ordering::Relaxed)
    }
}

/// An asynchronous logging context
///
/// # Example
///
/// ```
/// use rust_async_logger::prelude::*;
///
/// let list = ListAppender::new("captured");
/// let events = list.events_handle();
///
/// let context = LoggerContext::builder()
///     .name("app")
///     .ring_buffer_size(256)
///     .appender(list)
///     .build();
/// context.start().unwrap();
///
/// let logger = context.logger("app::server");
/// logger.info("listening");
///
/// assert!(context.stop(DEFAULT_SHUTDOWN_TIMEOUT));
/// assert_eq!(events.lock().len(), 1);
/// ```
pub struct LoggerContext {
    inner: Arc<ContextInner>,
}

impl LoggerContext {
    pub fn builder() -> LoggerContextBuilder {
        LoggerContextBuilder::new()
    }

    /// Context configured from `config` with default components
    pub fn from_config(config: AsyncLoggerConfig) -> Self {
        LoggerContextBuilder::from_config(config).build()
    }

    /// Create the ring buffer and start the consumer thread
    ///
    /// Does nothing if the context is already running. A stopped context
    /// can be started again with a fresh ring buffer.
    pub fn start(&self) -> Result<()> {
        let inner = &self.inner;
        let _lifecycle = inner.lifecycle.lock();
        if inner.running.read().is_some() {
            return Ok(());
        }

        let ring = Arc::new(RingBuffer::new(
            inner.ring_buffer_size,
            LogEvent::empty,
            Arc::clone(&inner.wait_strategy),
        )?);
        let processor = EventProcessor::new(
            Arc::clone(&ring),
            Arc::clone(&inner.dispatcher),
            Arc::clone(&inner.metrics),
            inner.id,
        )
        .spawn(&inner.name)?;

        inner.status.debug(format!(
            "Started logger context '{}' with ring buffer size {} and {:?}",
            inner.name, inner.ring_buffer_size, inner.wait_strategy
        ));
        *inner.running.write() = Some(Arc::new(Running { ring, processor }));
        Ok(())
    }

    /// Stop accepting events, drain the backlog and stop the consumer
    ///
    /// New publish calls fail with [`LoggerError::ShutDown`] as soon as
    /// this is called. The backlog is drained for at most `timeout`; the
    /// consumer is then halted and given a short grace period before it is
    /// detached. Never blocks much longer than `timeout`.
    ///
    /// Returns `true` if every queued event was processed and the consumer
    /// thread exited.
    ///
    /// [`LoggerError::ShutDown`]: super::error::LoggerError::ShutDown
    pub fn stop(&self, timeout: Duration) -> bool {
        let inner = &self.inner;
        let _lifecycle = inner.lifecycle.lock();
        let Some(running) = inner.running.write().take() else {
            return true;
        };
        let deadline = Instant::now() + timeout;

        running.ring.halt();
        running.processor.request_stop();

        while running.ring.has_backlog() && !running.processor.is_finished() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(DRAIN_POLL_INTERVAL.min(deadline - now));
        }

        let drained = !running.ring.has_backlog();
        if !drained {
            let pending = running.ring.capacity() - running.ring.remaining_capacity();
            inner.status.warn(format!(
                "Logger context '{}' did not drain within {:?}, abandoning {} events",
                inner.name, timeout, pending
            ));
            running.processor.halt();
        }

        let join_deadline = deadline.max(Instant::now() + JOIN_GRACE_PERIOD);
        let joined = running.processor.join_until(join_deadline, &inner.status);
        if !joined {
            inner.status.warn(format!(
                "AsyncLogger[{}] consumer thread did not stop, detaching it",
                inner.name
            ));
        }
        inner
            .status
            .debug(format!("Stopped logger context '{}'", inner.name));
        drained && joined
    }

    pub fn is_started(&self) -> bool {
        self.inner.running.read().is_some()
    }

    /// Handle for publishing events under `name`
    pub fn logger(&self, name: impl AsRef<str>) -> Logger {
        Logger {
            name: Arc::from(name.as_ref()),
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Effective ring buffer capacity (a power of two)
    pub fn capacity(&self) -> usize {
        self.inner.ring_buffer_size
    }

    /// Free ring buffer slots; the full capacity while stopped
    pub fn remaining_capacity(&self) -> usize {
        match self.inner.running.read().as_ref() {
            Some(running) => running.ring.remaining_capacity(),
            None => self.inner.ring_buffer_size,
        }
    }

    pub fn min_level(&self) -> LogLevel {
        LogLevel::from_u8(self.inner.min_level.load(Ordering::Relaxed))
    }

    pub fn set_min_level(&self, level: LogLevel) {
        self.inner.min_level.store(level.as_u8(), Ordering::Relaxed);
    }

    pub fn queue_full_policy(&self) -> QueueFullPolicy {
        self.inner.publisher.queue_full_policy()
    }

    pub fn wait_strategy(&self) -> &Arc<dyn WaitStrategy> {
        &self.inner.wait_strategy
    }

    /// Add an appender; takes effect from the consumer's next batch
    pub fn add_appender<A: Appender + 'static>(&self, appender: A) {
        self.inner.dispatcher.add_appender(Box::new(appender));
    }

    pub fn appender_names(&self) -> Vec<String> {
        self.inner.dispatcher.appender_names()
    }

    /// Flush all appenders from the calling thread
    pub fn flush(&self) {
        self.inner.dispatcher.flush();
    }

    /// Get the context metrics for detailed observability
    ///
    /// # Example
    ///
    /// ```
    /// use rust_async_logger::LoggerContext;
    ///
    /// let context = LoggerContext::builder().build();
    ///
    /// // After logging operations...
    /// let metrics = context.metrics();
    /// println!("Discarded: {}", metrics.discarded());
    /// println!("Processed: {}", metrics.processed());
    /// println!("Drop rate: {:.2}%", metrics.drop_rate());
    /// ```
    pub fn metrics(&self) -> &LoggerMetrics {
        &self.inner.metrics
    }

    /// Status log receiving this context's configuration and runtime warnings
    pub fn status(&self) -> &Arc<StatusLogger> {
        &self.inner.status
    }
}

impl fmt::Debug for LoggerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerContext")
            .field("name", &self.inner.name)
            .field("capacity", &self.inner.ring_buffer_size)
            .field("started", &self.is_started())
            .finish()
    }
}

impl Drop for LoggerContext {
    fn drop(&mut self) {
        if !self.is_started() {
            return;
        }
        self.stop(self.inner.shutdown_timeout);

        let discarded = self.inner.metrics.discarded();
        if discarded > 0 {
            self.inner.status.warn(format!(
                "Logger context '{}' shut down with {} discarded events (drop rate: {:.2}%)",
                self.inner.name,
                discarded,
                self.inner.metrics.drop_rate()
            ));
        }
    }
}

/// Named handle publishing into a [`LoggerContext`]
///
/// Publishing never blocks on appenders. The convenience methods
/// (`info`, `warn`, ...) ignore the result; [`Logger::try_log`] reports the
/// one observable failure, publishing after the context was stopped.
#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    inner: Arc<ContextInner>,
}

impl Logger {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context_name(&self) -> &str {
        &self.inner.name
    }

    /// True if events at `level` pass the context's level threshold
    #[inline]
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.inner.is_enabled(level)
    }

    /// Publish one event
    ///
    /// Returns `Ok` for events below the level threshold and for events the
    /// queue-full policy discarded. Fails with `ShutDown` once the context
    /// has been stopped.
    #[track_caller]
    pub fn try_log(
        &self,
        level: LogLevel,
        marker: Option<&Marker>,
        message: &dyn fmt::Display,
        thrown: Option<Thrown>,
    ) -> Result<()> {
        self.publish(level, marker, message, thrown, None)
    }

    #[doc(hidden)]
    #[track_caller]
    pub fn __log_from(
        &self,
        module_path: &'static str,
        level: LogLevel,
        message: fmt::Arguments<'_>,
    ) -> Result<()> {
        self.publish(level, None, &message, None, Some(module_path))
    }

    #[track_caller]
    fn publish(
        &self,
        level: LogLevel,
        marker: Option<&Marker>,
        message: &dyn fmt::Display,
        thrown: Option<Thrown>,
        module_path: Option<&'static str>,
    ) -> Result<()> {
        if !self.inner.is_enabled(level) {
            return Ok(());
        }
        let running = self.inner.running.read().clone();
        match running {
            Some(running) => self.inner.publisher.log(
                &running.ring,
                &self.name,
                level,
                marker,
                message,
                thrown,
                module_path,
            ),
            None => Err(self.inner.publisher.reject()),
        }
    }

    #[track_caller]
    pub fn log(&self, level: LogLevel, message: impl fmt::Display) {
        let _ = self.publish(level, None, &message, None, None);
    }

    /// Publish an event carrying an error value
    #[track_caller]
    pub fn log_error<E>(&self, level: LogLevel, message: impl fmt::Display, error: E)
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let _ = self.publish(level, None, &message, Some(Arc::new(error)), None);
    }

    /// Publish an event tagged with `marker`
    #[track_caller]
    pub fn log_marker(&self, level: LogLevel, marker: &Marker, message: impl fmt::Display) {
        let _ = self.publish(level, Some(marker), &message, None, None);
    }

    #[inline]
    #[track_caller]
    pub fn trace(&self, message: impl fmt::Display) {
        self.log(LogLevel::Trace, message);
    }

    #[inline]
    #[track_caller]
    pub fn debug(&self, message: impl fmt::Display) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    #[track_caller]
    pub fn info(&self, message: impl fmt::Display) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    #[track_caller]
    pub fn warn(&self, message: impl fmt::Display) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    #[track_caller]
    pub fn error(&self, message: impl fmt::Display) {
        self.log(LogLevel::Error, message);
    }

    #[inline]
    #[track_caller]
    pub fn fatal(&self, message: impl fmt::Display) {
        self.log(LogLevel::Fatal, message);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("context", &self.inner.name)
            .finish()
    }
}

/// Builder for constructing a [`LoggerContext`] with a fluent API
///
/// Named components (wait strategy, clock, exception handler, queue-full
/// policy) are resolved from the configuration at [`build`](Self::build)
/// time; unknown names fall back to defaults with a status warning.
/// Explicitly supplied components take precedence over names.
///
/// # Example
/// ```
/// use rust_async_logger::prelude::*;
/// use std::sync::Arc;
///
/// let context = LoggerContext::builder()
///     .name("worker")
///     .min_level(LogLevel::Debug)
///     .wait_strategy_name("Sleep")
///     .queue_full_policy(QueueFullPolicy::Discard { threshold: LogLevel::Info })
///     .on_discard(Arc::new(|count| {
///         eprintln!("ALERT: {} events discarded", count);
///     }))
///     .property("service", "worker-${env:HOSTNAME}")
///     .build();
/// assert!(!context.is_started());
/// ```
pub struct LoggerContextBuilder {
    config: AsyncLoggerConfig,
    clock: Option<Arc<dyn Clock>>,
    wait_strategy: Option<Arc<dyn WaitStrategy>>,
    exception_handler: Option<Arc<dyn ExceptionHandler>>,
    context_provider: Option<Arc<dyn ContextProvider>>,
    queue_full_policy: Option<QueueFullPolicy>,
    discard_callback: Option<DiscardCallback>,
    status: Option<Arc<StatusLogger>>,
    appenders: Vec<Box<dyn Appender>>,
}

impl LoggerContextBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::from_config(AsyncLoggerConfig::default())
    }

    pub fn from_config(config: AsyncLoggerConfig) -> Self {
        Self {
            config,
            clock: None,
            wait_strategy: None,
            exception_handler: None,
            context_provider: None,
            queue_full_policy: None,
            discard_callback: None,
            status: None,
            appenders: Vec::new(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.context_name = name.into();
        self
    }

    /// Requested capacity, rounded up to a power of two (minimum 128)
    #[must_use = "builder methods return a new value"]
    pub fn ring_buffer_size(mut self, size: usize) -> Self {
        self.config.ring_buffer_size = Some(size);
        self
    }

    /// Select a wait strategy by name (`Block`, `Timeout`, `Sleep`,
    /// `Yield`, `BusySpin`)
    #[must_use = "builder methods return a new value"]
    pub fn wait_strategy_name(mut self, name: impl Into<String>) -> Self {
        self.config.wait_strategy = Some(name.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn wait_strategy(mut self, strategy: Arc<dyn WaitStrategy>) -> Self {
        self.wait_strategy = Some(strategy);
        self
    }

    /// Select a clock by name (`SystemClock`, `CachedClock`,
    /// `CoarseCachedClock`)
    #[must_use = "builder methods return a new value"]
    pub fn clock_name(mut self, name: impl Into<String>) -> Self {
        self.config.clock = Some(name.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn exception_handler(mut self, handler: Arc<dyn ExceptionHandler>) -> Self {
        self.exception_handler = Some(handler);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn context_provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.context_provider = Some(provider);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn queue_full_policy(mut self, policy: QueueFullPolicy) -> Self {
        self.queue_full_policy = Some(policy);
        self
    }

    /// Set a callback for discard notifications
    ///
    /// Invoked on the first discarded event and every 1000th after, with
    /// the total discarded so far.
    #[must_use = "builder methods return a new value"]
    pub fn on_discard(mut self, callback: DiscardCallback) -> Self {
        self.discard_callback = Some(callback);
        self
    }

    /// Serialize producers blocked on a full ring buffer
    #[must_use = "builder methods return a new value"]
    pub fn synchronize_enqueue_when_full(mut self, enabled: bool) -> Self {
        self.config.synchronize_enqueue_when_full = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn include_location(mut self, enabled: bool) -> Self {
        self.config.include_location = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    /// Timeout used when the context is dropped while running
    #[must_use = "builder methods return a new value"]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout_millis = timeout.as_millis() as u64;
        self
    }

    /// Add a property merged into every event's context map
    #[must_use = "builder methods return a new value"]
    pub fn property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.properties.push(Property::new(name, value));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn status_logger(mut self, status: Arc<StatusLogger>) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn appender<A: Appender + 'static>(mut self, appender: A) -> Self {
        self.appenders.push(Box::new(appender));
        self
    }

    /// Resolve every component and build a stopped context
    pub fn build(self) -> LoggerContext {
        let config = self.config;
        let status = self.status.unwrap_or_else(StatusLogger::global);
        let metrics = Arc::new(LoggerMetrics::new());
        let name: Arc<str> = Arc::from(config.context_name.as_str());
        let id = next_context_id();

        let ring_buffer_size = calculate_ring_buffer_size(config.ring_buffer_size, &status);
        let wait_strategy = self.wait_strategy.unwrap_or_else(|| {
            create_wait_strategy(
                config.wait_strategy.as_deref(),
                &config.wait_strategy_params(),
                &status,
            )
        });
        let clock = self
            .clock
            .unwrap_or_else(|| create_clock(config.clock.as_deref(), &status));
        let exception_handler = self.exception_handler.unwrap_or_else(|| {
            resolve_exception_handler(config.exception_handler.as_deref(), &status)
        });
        let queue_full_policy = self.queue_full_policy.unwrap_or_else(|| {
            resolve_queue_full_policy(
                config.queue_full_policy.as_deref(),
                config.discard_threshold,
                &status,
            )
        });
        let context_provider = self
            .context_provider
            .unwrap_or_else(|| Arc::new(ThreadContextProvider));

        let dispatcher = Arc::new(Dispatcher::new(
            self.appenders,
            config.properties,
            exception_handler,
            Arc::clone(&metrics),
            Arc::clone(&status),
        ));
        let publisher = Publisher::new(
            PublisherSettings {
                context_name: Arc::clone(&name),
                context_id: id,
                clock,
                context_provider,
                include_location: config.include_location,
                queue_full_policy,
                synchronize_enqueue: config.synchronize_enqueue_when_full,
                discard_callback: self.discard_callback,
            },
            Arc::clone(&dispatcher),
            Arc::clone(&metrics),
            Arc::clone(&status),
        );

        LoggerContext {
            inner: Arc::new(ContextInner {
                name,
                id,
                ring_buffer_size,
                wait_strategy,
                min_level: AtomicU8::new(config.level.as_u8()),
                shutdown_timeout: Duration::from_millis(config.shutdown_timeout_millis),
                publisher,
                dispatcher,
                metrics,
                status,
                running: RwLock::new(None),
                lifecycle: Mutex::new(()),
            }),
        }
    }
}

impl Default for LoggerContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
