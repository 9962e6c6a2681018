//! Producer side of a logger context
//!
//! Everything an event needs is gathered on the calling thread before the
//! event is published: thread identity, context snapshots, the optional
//! call-site location and the timestamp. The consumer must never read the
//! producer's thread-local state, which may have changed by the time the
//! event is processed.

use super::clock::Clock;
use super::error::{LoggerError, Result};
use super::log_context::{ContextMap, ContextProvider, ContextStack};
use super::log_event::{LogEvent, Marker, SourceLocation, Thrown};
use super::log_level::LogLevel;
use super::metrics::LoggerMetrics;
use super::processor::Dispatcher;
use super::queue_full_policy::{DiscardCallback, EventRoute, QueueFullPolicy};
use super::ring_buffer::RingBuffer;
use super::status::StatusLogger;
use parking_lot::Mutex;
use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Per-thread values reused by every publish from that thread
struct PublishInfo {
    thread_name: Arc<str>,
    thread_id: u64,
    /// Id of the context whose consumer runs on this thread, 0 if none
    consumer_of: Cell<u64>,
}

impl PublishInfo {
    fn current() -> Self {
        let thread = std::thread::current();
        let thread_name = match thread.name() {
            Some(name) => Arc::from(name),
            None => Arc::from(format!("{:?}", thread.id())),
        };
        Self {
            thread_name,
            thread_id: NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed),
            consumer_of: Cell::new(0),
        }
    }
}

thread_local! {
    static PUBLISH_INFO: PublishInfo = PublishInfo::current();
}

pub(crate) fn next_context_id() -> u64 {
    NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Mark the calling thread as the consumer of `context_id`
pub(crate) fn mark_consumer_thread(context_id: u64) {
    PUBLISH_INFO.with(|info| info.consumer_of.set(context_id));
}

pub(crate) fn is_consumer_thread(context_id: u64) -> bool {
    PUBLISH_INFO.with(|info| info.consumer_of.get() == context_id)
}

/// Values captured on the producer thread, waiting to be copied into a slot
pub(crate) struct EventTranslator<'a> {
    logger_name: &'a Arc<str>,
    level: LogLevel,
    marker: Option<&'a Marker>,
    message: &'a dyn fmt::Display,
    thrown: Option<Thrown>,
    context_map: ContextMap,
    context_stack: ContextStack,
    thread_name: Arc<str>,
    thread_id: u64,
    timestamp: i64,
    source: Option<SourceLocation>,
}

impl EventTranslator<'_> {
    /// Populate a claimed ring buffer slot in place
    pub(crate) fn translate_to(self, event: &mut LogEvent) {
        event.logger_name = Arc::clone(self.logger_name);
        event.level = self.level;
        event.set_message(self.message);
        event.thrown = self.thrown;
        event.context_map = self.context_map;
        event.context_stack = self.context_stack;
        event.thread_name = self.thread_name;
        event.thread_id = self.thread_id;
        event.timestamp = self.timestamp;
        event.source = self.source;
        event.marker = self.marker.cloned();
        event.populated = true;
    }

    /// Owned event for paths that bypass the ring buffer
    pub(crate) fn into_event(self) -> LogEvent {
        let mut event = LogEvent::empty();
        self.translate_to(&mut event);
        event
    }
}

/// Publishes events from application threads into a context's ring buffer
pub(crate) struct Publisher {
    context_name: Arc<str>,
    context_id: u64,
    clock: Arc<dyn Clock>,
    context_provider: Arc<dyn ContextProvider>,
    include_location: bool,
    queue_full_policy: QueueFullPolicy,
    synchronize_enqueue: bool,
    enqueue_lock: Mutex<()>,
    discard_callback: Option<DiscardCallback>,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<LoggerMetrics>,
    status: Arc<StatusLogger>,
}

pub(crate) struct PublisherSettings {
    pub context_name: Arc<str>,
    pub context_id: u64,
    pub clock: Arc<dyn Clock>,
    pub context_provider: Arc<dyn ContextProvider>,
    pub include_location: bool,
    pub queue_full_policy: QueueFullPolicy,
    pub synchronize_enqueue: bool,
    pub discard_callback: Option<DiscardCallback>,
}

impl Publisher {
    pub(crate) fn new(
        settings: PublisherSettings,
        dispatcher: Arc<Dispatcher>,
        metrics: Arc<LoggerMetrics>,
        status: Arc<StatusLogger>,
    ) -> Self {
        Self {
            context_name: settings.context_name,
            context_id: settings.context_id,
            clock: settings.clock,
            context_provider: settings.context_provider,
            include_location: settings.include_location,
            queue_full_policy: settings.queue_full_policy,
            synchronize_enqueue: settings.synchronize_enqueue,
            enqueue_lock: Mutex::new(()),
            discard_callback: settings.discard_callback,
            dispatcher,
            metrics,
            status,
        }
    }

    pub(crate) fn queue_full_policy(&self) -> QueueFullPolicy {
        self.queue_full_policy
    }

    /// Capture and publish one event
    ///
    /// Returns `Err(ShutDown)` once the ring buffer stops accepting claims.
    /// Every other outcome (enqueued, written synchronously, discarded) is
    /// `Ok`.
    #[track_caller]
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn log(
        &self,
        ring: &RingBuffer<LogEvent>,
        logger_name: &Arc<str>,
        level: LogLevel,
        marker: Option<&Marker>,
        message: &dyn fmt::Display,
        thrown: Option<Thrown>,
        module_path: Option<&'static str>,
    ) -> Result<()> {
        let translator = self.capture(logger_name, level, marker, message, thrown, module_path);

        if let Some(sequence) = ring.try_claim_next() {
            translator.translate_to(&mut ring.slot(sequence));
            ring.publish(sequence);
            self.metrics.record_published();
            return Ok(());
        }
        if ring.is_halted() {
            return Err(self.reject());
        }

        self.metrics.record_queue_full();
        let on_consumer_thread = is_consumer_thread(self.context_id);
        match self.queue_full_policy.route(level, on_consumer_thread) {
            EventRoute::Enqueue => self.enqueue(ring, translator, on_consumer_thread),
            EventRoute::Synchronous => {
                self.log_synchronously(translator, on_consumer_thread);
                Ok(())
            }
            EventRoute::Discard => {
                self.discard();
                Ok(())
            }
        }
    }

    #[track_caller]
    fn capture<'a>(
        &self,
        logger_name: &'a Arc<str>,
        level: LogLevel,
        marker: Option<&'a Marker>,
        message: &'a dyn fmt::Display,
        thrown: Option<Thrown>,
        module_path: Option<&'static str>,
    ) -> EventTranslator<'a> {
        let (thread_name, thread_id) =
            PUBLISH_INFO.with(|info| (Arc::clone(&info.thread_name), info.thread_id));
        let context_map = self.context_provider.context_map();
        let context_stack = self.context_provider.context_stack();
        // Location lookup must stay outside closures to keep the caller's frame
        let source = if self.include_location {
            Some(SourceLocation {
                module_path,
                ..SourceLocation::caller()
            })
        } else {
            None
        };
        let timestamp = self.clock.current_time_millis();

        EventTranslator {
            logger_name,
            level,
            marker,
            message,
            thrown,
            context_map,
            context_stack,
            thread_name,
            thread_id,
            timestamp,
            source,
        }
    }

    fn enqueue(
        &self,
        ring: &RingBuffer<LogEvent>,
        translator: EventTranslator<'_>,
        on_consumer_thread: bool,
    ) -> Result<()> {
        let claimed = if self.synchronize_enqueue && !on_consumer_thread {
            let _serialized = self.enqueue_lock.lock();
            ring.claim_next()
        } else {
            ring.claim_next()
        };
        let sequence = claimed.map_err(|_| self.reject())?;

        translator.translate_to(&mut ring.slot(sequence));
        ring.publish(sequence);
        self.metrics.record_published();
        Ok(())
    }

    fn log_synchronously(&self, translator: EventTranslator<'_>, on_consumer_thread: bool) {
        let mut event = translator.into_event();
        if self.dispatcher.dispatch_now(&mut event, on_consumer_thread) {
            self.metrics.record_synchronous();
        } else {
            self.status.warn(format!(
                "Dropping event from '{}' logged by an appender of context '{}' while its ring buffer is full",
                event.logger_name(),
                self.context_name
            ));
            self.metrics.record_discarded();
        }
    }

    fn discard(&self) {
        let total = self.metrics.record_discarded() + 1;
        if total == 1 || total % 1000 == 0 {
            self.status.warn(format!(
                "Ring buffer of context '{}' full, {} events discarded",
                self.context_name, total
            ));
            if let Some(callback) = &self.discard_callback {
                callback(total);
            }
        }
    }

    /// Error returned to publishers once the context has begun shutting down
    pub(crate) fn reject(&self) -> LoggerError {
        if self.metrics.record_rejected() == 0 {
            self.status.warn(format!(
                "Ignoring log event after logger context '{}' was shut down",
                self.context_name
            ));
        }
        LoggerError::shut_down(&*self.context_name)
    }
}
