//! Consumer side of a logger context
//!
//! A single dedicated thread waits for published sequences, merges the
//! configured properties into each event and hands it to every appender,
//! strictly in sequence order. Appender errors and panics are routed to an
//! [`ExceptionHandler`]; they never end the consumer thread.

use super::appender::Appender;
use super::error::{LoggerError, Result};
use super::log_event::LogEvent;
use super::metrics::LoggerMetrics;
use super::property::{merge_properties, Property};
use super::publisher::mark_consumer_thread;
use super::ring_buffer::RingBuffer;
use super::status::StatusLogger;
use super::wait_strategy::WaitOutcome;
use crossbeam_utils::Backoff;
use parking_lot::{Mutex, MutexGuard};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Receives failures raised while delivering an event
///
/// `sequence` is `None` for events written synchronously on a producer
/// thread.
pub trait ExceptionHandler: Send + Sync {
    fn handle_event_error(&self, error: &LoggerError, sequence: Option<i64>, event: &LogEvent);
}

/// Reports the failure to the status log and continues
pub struct DefaultExceptionHandler {
    status: Arc<StatusLogger>,
}

impl DefaultExceptionHandler {
    pub fn new(status: Arc<StatusLogger>) -> Self {
        Self { status }
    }
}

impl ExceptionHandler for DefaultExceptionHandler {
    fn handle_event_error(&self, error: &LoggerError, sequence: Option<i64>, event: &LogEvent) {
        let sequence = match sequence {
            Some(sequence) => sequence.to_string(),
            None => "sync".to_string(),
        };
        self.status.error(format!(
            "AsyncLogger error handling event seq={}, value='{}': {}",
            sequence,
            event.message(),
            error
        ));
    }
}

/// Drops failures silently; they are still counted in the metrics
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreExceptionHandler;

impl ExceptionHandler for IgnoreExceptionHandler {
    fn handle_event_error(&self, _error: &LoggerError, _sequence: Option<i64>, _event: &LogEvent) {}
}

/// Resolve a configured handler name (`default` or `ignore`)
///
/// Unknown names are reported to `status` and resolve to
/// [`DefaultExceptionHandler`].
pub fn resolve_exception_handler(
    name: Option<&str>,
    status: &Arc<StatusLogger>,
) -> Arc<dyn ExceptionHandler> {
    match name.map(|n| n.trim().to_ascii_lowercase()) {
        None => Arc::new(DefaultExceptionHandler::new(Arc::clone(status))),
        Some(name) => match name.as_str() {
            "" | "default" => Arc::new(DefaultExceptionHandler::new(Arc::clone(status))),
            "ignore" | "none" => Arc::new(IgnoreExceptionHandler),
            other => {
                status.warn(format!(
                    "Unknown exception handler '{}', using default instead",
                    other
                ));
                Arc::new(DefaultExceptionHandler::new(Arc::clone(status)))
            }
        },
    }
}

/// Owns the appenders and delivers events to them
pub(crate) struct Dispatcher {
    appenders: Mutex<Vec<Box<dyn Appender>>>,
    properties: Vec<Property>,
    exception_handler: Arc<dyn ExceptionHandler>,
    metrics: Arc<LoggerMetrics>,
    status: Arc<StatusLogger>,
}

impl Dispatcher {
    pub(crate) fn new(
        appenders: Vec<Box<dyn Appender>>,
        properties: Vec<Property>,
        exception_handler: Arc<dyn ExceptionHandler>,
        metrics: Arc<LoggerMetrics>,
        status: Arc<StatusLogger>,
    ) -> Self {
        Self {
            appenders: Mutex::new(appenders),
            properties,
            exception_handler,
            metrics,
            status,
        }
    }

    pub(crate) fn add_appender(&self, appender: Box<dyn Appender>) {
        self.appenders.lock().push(appender);
    }

    pub(crate) fn appender_names(&self) -> Vec<String> {
        self.appenders
            .lock()
            .iter()
            .map(|appender| appender.name().to_string())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Box<dyn Appender>>> {
        self.appenders.lock()
    }

    /// Merge properties into `event` and send it to every appender
    ///
    /// Each appender is isolated: an error or panic in one is reported and
    /// the remaining appenders still receive the event.
    fn deliver(
        &self,
        appenders: &mut [Box<dyn Appender>],
        event: &mut LogEvent,
        sequence: Option<i64>,
    ) {
        if !self.properties.is_empty() {
            merge_properties(&self.properties, &mut event.context_map);
        }
        let event = &*event;
        for appender in appenders.iter_mut() {
            let outcome = catch_unwind(AssertUnwindSafe(|| appender.append(event)));
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e @ LoggerError::AppenderFailure { .. })) => e,
                Ok(Err(e)) => LoggerError::appender(appender.name(), e.to_string()),
                Err(payload) => LoggerError::appender_panic(appender.name(), &*payload),
            };
            self.report(&error, sequence, event);
        }
    }

    fn report(&self, error: &LoggerError, sequence: Option<i64>, event: &LogEvent) {
        self.metrics.record_appender_failure();
        let handled = catch_unwind(AssertUnwindSafe(|| {
            self.exception_handler
                .handle_event_error(error, sequence, event)
        }));
        if handled.is_err() {
            self.status.error(format!(
                "Exception handler panicked while handling: {}",
                error
            ));
        }
    }

    fn flush_appenders(&self, appenders: &mut [Box<dyn Appender>]) {
        for appender in appenders.iter_mut() {
            let outcome = catch_unwind(AssertUnwindSafe(|| appender.flush()));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => {
                    LoggerError::appender_panic(appender.name(), &*payload).to_string()
                }
            };
            self.metrics.record_appender_failure();
            self.status.warn(format!(
                "Appender '{}' flush failed: {}",
                appender.name(),
                message
            ));
        }
    }

    /// Flush every appender, waiting for the consumer if it is mid-batch
    pub(crate) fn flush(&self) {
        let mut appenders = self.lock();
        self.flush_appenders(&mut appenders);
    }

    /// Deliver and flush `event` on the calling thread
    ///
    /// On the consumer thread the appenders may already be locked by the
    /// batch in progress; the event is then refused and `false` returned.
    pub(crate) fn dispatch_now(&self, event: &mut LogEvent, on_consumer_thread: bool) -> bool {
        let guard = if on_consumer_thread {
            self.appenders.try_lock()
        } else {
            Some(self.appenders.lock())
        };
        match guard {
            Some(mut appenders) => {
                self.deliver(&mut appenders, event, None);
                self.flush_appenders(&mut appenders);
                true
            }
            None => false,
        }
    }
}

/// Signals shared between a consumer thread and its context
#[derive(Debug, Default)]
pub(crate) struct ProcessorControl {
    /// Wakes the consumer out of its wait strategy
    alert: AtomicBool,
    /// Stop immediately, abandoning any backlog
    halted: AtomicBool,
}

impl ProcessorControl {
    fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }
}

/// Consumer loop over one ring buffer
pub(crate) struct EventProcessor {
    ring: Arc<RingBuffer<LogEvent>>,
    dispatcher: Arc<Dispatcher>,
    control: Arc<ProcessorControl>,
    metrics: Arc<LoggerMetrics>,
    context_id: u64,
}

impl EventProcessor {
    pub(crate) fn new(
        ring: Arc<RingBuffer<LogEvent>>,
        dispatcher: Arc<Dispatcher>,
        metrics: Arc<LoggerMetrics>,
        context_id: u64,
    ) -> Self {
        Self {
            ring,
            dispatcher,
            control: Arc::new(ProcessorControl::default()),
            metrics,
            context_id,
        }
    }

    /// Run the loop on a new thread named `AsyncLogger[<context>]`
    pub(crate) fn spawn(self, context_name: &str) -> Result<ProcessorHandle> {
        let control = Arc::clone(&self.control);
        let ring = Arc::clone(&self.ring);
        let thread = thread::Builder::new()
            .name(format!("AsyncLogger[{}]", context_name))
            .spawn(move || self.run())?;
        Ok(ProcessorHandle {
            thread: Mutex::new(Some(thread)),
            control,
            ring,
        })
    }

    fn run(self) {
        mark_consumer_thread(self.context_id);
        let wait_strategy = Arc::clone(self.ring.wait_strategy());
        let backoff = Backoff::new();
        let mut next = self.ring.gating_sequence() + 1;

        while !self.control.is_halted() {
            match wait_strategy.wait_for(next, self.ring.cursor_ref(), &self.control.alert) {
                WaitOutcome::Available(available) => {
                    let processed_to = self.process_batch(next, available);
                    if processed_to == next {
                        // claimed but not yet published
                        backoff.snooze();
                    } else {
                        backoff.reset();
                    }
                    next = processed_to;
                }
                WaitOutcome::TimedOut => self.dispatcher.flush(),
                WaitOutcome::Alerted => {
                    self.drain(next);
                    break;
                }
            }
        }

        if !self.control.is_halted() {
            self.dispatcher.flush();
        }
    }

    /// Process every published sequence in `next..=available`
    ///
    /// Returns the next sequence to wait for.
    fn process_batch(&self, next: i64, available: i64) -> i64 {
        let highest = self.ring.highest_published(next, available);
        if highest < next {
            return next;
        }

        let mut appenders = self.dispatcher.lock();
        for sequence in next..=highest {
            if self.control.is_halted() {
                return sequence;
            }
            {
                let mut slot = self.ring.slot(sequence);
                self.dispatcher
                    .deliver(&mut appenders, &mut slot, Some(sequence));
                slot.clear();
            }
            self.ring.set_gating_sequence(sequence);
            self.metrics.record_processed();
        }
        self.dispatcher.flush_appenders(&mut appenders);
        highest + 1
    }

    /// Consume everything claimed before shutdown was requested
    fn drain(&self, mut next: i64) {
        let backoff = Backoff::new();
        while !self.control.is_halted() {
            let cursor = self.ring.cursor();
            if next > cursor {
                return;
            }
            let processed_to = self.process_batch(next, cursor);
            if processed_to == next {
                backoff.snooze();
            } else {
                backoff.reset();
            }
            next = processed_to;
        }
    }
}

/// Handle to a running consumer thread
pub(crate) struct ProcessorHandle {
    thread: Mutex<Option<JoinHandle<()>>>,
    control: Arc<ProcessorControl>,
    ring: Arc<RingBuffer<LogEvent>>,
}

impl ProcessorHandle {
    /// Ask the consumer to finish the backlog and exit
    pub(crate) fn request_stop(&self) {
        self.control.alert.store(true, Ordering::Release);
        self.ring.wait_strategy().signal_all_when_blocking();
    }

    /// Ask the consumer to exit after the event in progress
    pub(crate) fn halt(&self) {
        self.control.halted.store(true, Ordering::Release);
        self.request_stop();
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.thread
            .lock()
            .as_ref()
            .map_or(true, |thread| thread.is_finished())
    }

    /// Join the consumer if it finishes before `deadline`
    ///
    /// Returns `false` if it is still running at the deadline; the thread
    /// is then left detached.
    pub(crate) fn join_until(&self, deadline: Instant, status: &StatusLogger) -> bool {
        loop {
            if self.is_finished() {
                if let Some(thread) = self.thread.lock().take() {
                    if thread.join().is_err() {
                        status.error("AsyncLogger consumer thread panicked");
                        return false;
                    }
                }
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep((deadline - now).min(Duration::from_millis(5)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appenders::ListAppender;
    use crate::core::log_level::LogLevel;
    use crate::core::publisher::next_context_id;
    use crate::core::status::StatusLevel;
    use crate::core::wait_strategy::TimeoutBlockingWaitStrategy;

    struct FailingAppender {
        panic: bool,
    }

    impl Appender for FailingAppender {
        fn append(&mut self, _event: &LogEvent) -> Result<()> {
            if self.panic {
                panic!("appender exploded");
            }
            Err(LoggerError::other("disk full"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn quiet_status() -> Arc<StatusLogger> {
        Arc::new(StatusLogger::new().with_print_level(StatusLevel::Error))
    }

    fn event(message: &str) -> LogEvent {
        let mut event = LogEvent::empty();
        event.level = LogLevel::Info;
        event.set_message(&message);
        event.populated = true;
        event
    }

    #[test]
    fn test_failing_appender_does_not_starve_others() {
        let status = quiet_status();
        let metrics = Arc::new(LoggerMetrics::new());
        let list = ListAppender::new("list");
        let events = list.events_handle();
        let dispatcher = Dispatcher::new(
            vec![
                Box::new(FailingAppender { panic: true }),
                Box::new(FailingAppender { panic: false }),
                Box::new(list),
            ],
            Vec::new(),
            Arc::new(DefaultExceptionHandler::new(Arc::clone(&status))),
            Arc::clone(&metrics),
            Arc::clone(&status),
        );

        let mut e = event("hello");
        assert!(dispatcher.dispatch_now(&mut e, false));
        assert_eq!(events.lock().len(), 1);
        assert_eq!(metrics.appender_failures(), 2);
        assert!(status.contains(StatusLevel::Error, "appender exploded"));
        assert!(status.contains(StatusLevel::Error, "disk full"));
        assert!(status.contains(StatusLevel::Error, "seq=sync"));
    }

    #[test]
    fn test_properties_merged_before_delivery() {
        let list = ListAppender::new("list");
        let events = list.events_handle();
        let dispatcher = Dispatcher::new(
            vec![Box::new(list)],
            vec![Property::new("service", "billing")],
            Arc::new(IgnoreExceptionHandler),
            Arc::new(LoggerMetrics::new()),
            quiet_status(),
        );
        let mut e = event("merged");
        dispatcher.dispatch_now(&mut e, false);
        let captured = events.lock();
        assert_eq!(captured[0].context_map().get("service"), Some("billing"));
    }

    #[test]
    fn test_consumer_thread_cannot_reenter_locked_appenders() {
        let dispatcher = Dispatcher::new(
            Vec::new(),
            Vec::new(),
            Arc::new(IgnoreExceptionHandler),
            Arc::new(LoggerMetrics::new()),
            quiet_status(),
        );
        let _batch = dispatcher.lock();
        let mut e = event("recursive");
        assert!(!dispatcher.dispatch_now(&mut e, true));
    }

    #[test]
    fn test_exception_handler_resolution() {
        let status = quiet_status();
        resolve_exception_handler(Some("ignore"), &status);
        resolve_exception_handler(Some("Default"), &status);
        assert!(status.entries().is_empty());
        resolve_exception_handler(Some("com.example.Missing"), &status);
        assert!(status.contains(StatusLevel::Warn, "com.example.missing"));
    }

    #[test]
    fn test_processor_drains_in_order_then_stops() {
        let status = quiet_status();
        let metrics = Arc::new(LoggerMetrics::new());
        let list = ListAppender::new("list");
        let events = list.events_handle();
        let dispatcher = Arc::new(Dispatcher::new(
            vec![Box::new(list)],
            Vec::new(),
            Arc::new(IgnoreExceptionHandler),
            Arc::clone(&metrics),
            Arc::clone(&status),
        ));
        let ring = Arc::new(
            RingBuffer::new(
                128,
                LogEvent::empty,
                Arc::new(TimeoutBlockingWaitStrategy::new(Duration::from_millis(5))),
            )
            .expect("ring"),
        );
        let handle = EventProcessor::new(
            Arc::clone(&ring),
            dispatcher,
            Arc::clone(&metrics),
            next_context_id(),
        )
        .spawn("test")
        .expect("spawn");

        for i in 0..50 {
            let sequence = ring.claim_next().expect("claim");
            {
                let mut slot = ring.slot(sequence);
                slot.set_message(&i);
                slot.populated = true;
            }
            ring.publish(sequence);
        }
        handle.request_stop();
        assert!(handle.join_until(Instant::now() + Duration::from_secs(5), &status));

        let captured = events.lock();
        let messages: Vec<String> = captured.iter().map(|e| e.message().to_string()).collect();
        let expected: Vec<String> = (0..50).map(|i| i.to_string()).collect();
        assert_eq!(messages, expected);
        assert_eq!(metrics.processed(), 50);
        assert!(!ring.has_backlog());
    }
}
