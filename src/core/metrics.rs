//! Logger metrics for observability
//!
//! Counters for events flowing through a context: how many were
//! published to the ring buffer, processed by the consumer, discarded,
//! written synchronously, or rejected after shutdown.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for logger observability
///
/// # Example
///
/// ```
/// use rust_async_logger::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
/// metrics.record_published();
/// metrics.record_discarded();
///
/// assert_eq!(metrics.published(), 1);
/// assert_eq!(metrics.discarded(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Events published into the ring buffer
    published: AtomicU64,

    /// Events the consumer finished dispatching
    processed: AtomicU64,

    /// Events dropped by the queue-full policy
    discarded: AtomicU64,

    /// Events written on the caller's thread because the ring was full
    synchronous: AtomicU64,

    /// Times a producer found the ring buffer full
    queue_full_events: AtomicU64,

    /// Appender errors and panics routed to the exception handler
    appender_failures: AtomicU64,

    /// Publish attempts after shutdown began
    rejected: AtomicU64,
}

impl LoggerMetrics {
    pub const fn new() -> Self {
        Self {
            published: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            synchronous: AtomicU64::new(0),
            queue_full_events: AtomicU64::new(0),
            appender_failures: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn synchronous(&self) -> u64 {
        self.synchronous.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn queue_full_events(&self) -> u64 {
        self.queue_full_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn appender_failures(&self) -> u64 {
        self.appender_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Record a published event, returning the previous count
    #[inline]
    pub fn record_published(&self) -> u64 {
        self.published.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_processed(&self) -> u64 {
        self.processed.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_discarded(&self) -> u64 {
        self.discarded.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_synchronous(&self) -> u64 {
        self.synchronous.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_queue_full(&self) -> u64 {
        self.queue_full_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_appender_failure(&self) -> u64 {
        self.appender_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_rejected(&self) -> u64 {
        self.rejected.fetch_add(1, Ordering::Relaxed)
    }

    /// Discarded events as a percentage (0.0 - 100.0) of all accepted calls
    ///
    /// Returns 0.0 if nothing has been logged.
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.discarded() as f64;
        let total = self.published() as f64 + self.synchronous() as f64 + dropped;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.published.store(0, Ordering::Relaxed);
        self.processed.store(0, Ordering::Relaxed);
        self.discarded.store(0, Ordering::Relaxed);
        self.synchronous.store(0, Ordering::Relaxed);
        self.queue_full_events.store(0, Ordering::Relaxed);
        self.appender_failures.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            published: AtomicU64::new(self.published()),
            processed: AtomicU64::new(self.processed()),
            discarded: AtomicU64::new(self.discarded()),
            synchronous: AtomicU64::new(self.synchronous()),
            queue_full_events: AtomicU64::new(self.queue_full_events()),
            appender_failures: AtomicU64::new(self.appender_failures()),
            rejected: AtomicU64::new(self.rejected()),
        }
    }
}
