//! Fixed-capacity multi-producer / single-consumer ring buffer
//!
//! Slots are allocated once and reused in place. Producers claim strictly
//! increasing sequence numbers with a compare-and-swap on the shared cursor,
//! write into slot `sequence & mask`, then publish. The consumer advances a
//! gating sequence as it finishes each slot; a producer may never claim a
//! sequence more than `capacity` ahead of it.
//!
//! Publication is tracked per slot: `available[i]` holds the last sequence
//! published into slot `i`, so the consumer can find the highest contiguous
//! published sequence even when producers publish out of claim order.

use super::error::{LoggerError, Result};
use super::status::StatusLogger;
use super::wait_strategy::WaitStrategy;
use crossbeam_utils::{Backoff, CachePadded};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

/// Smallest capacity a ring buffer is built with
pub const MIN_RING_BUFFER_SIZE: usize = 128;

/// Capacity used when none is configured
pub const DEFAULT_RING_BUFFER_SIZE: usize = 4 * 1024;

/// Largest accepted capacity; larger requests are clamped
pub const MAX_RING_BUFFER_SIZE: usize = 1 << 30;

/// Sequence value before anything has been claimed or consumed
pub const INITIAL_SEQUENCE: i64 = -1;

/// Effective capacity for a requested size
///
/// Requests below [`MIN_RING_BUFFER_SIZE`] are clamped up with a warning,
/// and the result is rounded up to the next power of two. Never fails.
///
/// ```
/// use rust_async_logger::core::{calculate_ring_buffer_size, StatusLevel, StatusLogger};
///
/// let status = StatusLogger::new().with_print_level(StatusLevel::Error);
/// assert_eq!(calculate_ring_buffer_size(Some(200), &status), 256);
/// assert_eq!(calculate_ring_buffer_size(Some(10), &status), 128);
/// ```
pub fn calculate_ring_buffer_size(requested: Option<usize>, status: &StatusLogger) -> usize {
    let mut size = requested.unwrap_or(DEFAULT_RING_BUFFER_SIZE);
    if size < MIN_RING_BUFFER_SIZE {
        status.warn(format!(
            "Invalid RingBufferSize {}, using minimum size {}",
            size, MIN_RING_BUFFER_SIZE
        ));
        size = MIN_RING_BUFFER_SIZE;
    }
    if size > MAX_RING_BUFFER_SIZE {
        status.warn(format!(
            "RingBufferSize {} too large, using maximum size {}",
            size, MAX_RING_BUFFER_SIZE
        ));
        size = MAX_RING_BUFFER_SIZE;
    }
    size.next_power_of_two()
}

pub struct RingBuffer<E> {
    slots: Box<[Mutex<E>]>,
    available: Box<[AtomicI64]>,
    mask: i64,
    capacity: i64,
    /// Highest claimed sequence
    cursor: CachePadded<AtomicI64>,
    /// Highest sequence the consumer has finished with
    gating: CachePadded<AtomicI64>,
    halted: AtomicBool,
    wait_strategy: Arc<dyn WaitStrategy>,
}

impl<E> RingBuffer<E> {
    /// Build a ring of `capacity` slots filled by `factory`
    ///
    /// `capacity` must be a power of two; use
    /// [`calculate_ring_buffer_size`] to derive one from configuration.
    pub fn new(
        capacity: usize,
        mut factory: impl FnMut() -> E,
        wait_strategy: Arc<dyn WaitStrategy>,
    ) -> Result<Self> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(LoggerError::config(
                "RingBuffer",
                format!("capacity {} is not a power of two", capacity),
            ));
        }
        let slots = (0..capacity).map(|_| Mutex::new(factory())).collect();
        let available = (0..capacity)
            .map(|_| AtomicI64::new(INITIAL_SEQUENCE))
            .collect();
        Ok(Self {
            slots,
            available,
            mask: capacity as i64 - 1,
            capacity: capacity as i64,
            cursor: CachePadded::new(AtomicI64::new(INITIAL_SEQUENCE)),
            gating: CachePadded::new(AtomicI64::new(INITIAL_SEQUENCE)),
            halted: AtomicBool::new(false),
            wait_strategy,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Claim the next sequence, waiting while the ring is full
    ///
    /// Fails only once the ring has been halted, so producers blocked on a
    /// full ring are released at shutdown instead of hanging.
    pub fn claim_next(&self) -> Result<i64> {
        let backoff = Backoff::new();
        loop {
            if self.halted.load(Ordering::Acquire) {
                return Err(LoggerError::other("ring buffer halted"));
            }
            let current = self.cursor.load(Ordering::Acquire);
            let next = current + 1;
            if next - self.capacity > self.gating.load(Ordering::Acquire) {
                backoff.snooze();
                if backoff.is_completed() {
                    std::thread::park_timeout(std::time::Duration::from_micros(50));
                }
                continue;
            }
            if self
                .cursor
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Ok(next);
            }
            backoff.spin();
        }
    }

    /// Claim the next sequence, or `None` if the ring is full or halted
    pub fn try_claim_next(&self) -> Option<i64> {
        loop {
            if self.halted.load(Ordering::Acquire) {
                return None;
            }
            let current = self.cursor.load(Ordering::Acquire);
            let next = current + 1;
            if next - self.capacity > self.gating.load(Ordering::Acquire) {
                return None;
            }
            if self
                .cursor
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(next);
            }
            std::hint::spin_loop();
        }
    }

    /// Exclusive access to the slot for `sequence`
    ///
    /// Only the producer that claimed `sequence` (before publishing) or the
    /// consumer (after publication) may touch a slot, so the lock is never
    /// contended in correct use.
    #[inline]
    pub fn slot(&self, sequence: i64) -> MutexGuard<'_, E> {
        self.slots[(sequence & self.mask) as usize].lock()
    }

    /// Make `sequence` visible to the consumer
    #[inline]
    pub fn publish(&self, sequence: i64) {
        self.available[(sequence & self.mask) as usize].store(sequence, Ordering::Release);
        self.wait_strategy.signal_all_when_blocking();
    }

    #[inline]
    pub fn is_available(&self, sequence: i64) -> bool {
        self.available[(sequence & self.mask) as usize].load(Ordering::Acquire) == sequence
    }

    /// Highest sequence in `low..=available` such that every sequence up to
    /// it has been published; `low - 1` if `low` itself is not yet published
    pub fn highest_published(&self, low: i64, available: i64) -> i64 {
        let mut sequence = low;
        while sequence <= available {
            if !self.is_available(sequence) {
                return sequence - 1;
            }
            sequence += 1;
        }
        available
    }

    /// Highest claimed sequence
    #[inline]
    pub fn cursor(&self) -> i64 {
        self.cursor.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn cursor_ref(&self) -> &AtomicI64 {
        &self.cursor
    }

    /// Highest sequence the consumer has finished processing
    #[inline]
    pub fn gating_sequence(&self) -> i64 {
        self.gating.load(Ordering::Acquire)
    }

    /// Record that the consumer finished `sequence`, freeing its slot
    #[inline]
    pub fn set_gating_sequence(&self, sequence: i64) {
        self.gating.store(sequence, Ordering::Release);
    }

    /// Free slots available to producers right now
    pub fn remaining_capacity(&self) -> usize {
        let consumed = self.gating.load(Ordering::Acquire);
        let produced = self.cursor.load(Ordering::Acquire);
        (self.capacity - (produced - consumed)).max(0) as usize
    }

    /// True while claimed events have not been fully consumed
    pub fn has_backlog(&self) -> bool {
        self.remaining_capacity() < self.capacity()
    }

    /// Release every producer waiting in [`claim_next`](Self::claim_next)
    /// and refuse further claims
    pub fn halt(&self) {
        self.halted.store(true, Ordering::Release);
        self.wait_strategy.signal_all_when_blocking();
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    pub fn wait_strategy(&self) -> &Arc<dyn WaitStrategy> {
        &self.wait_strategy
    }
}

impl<E> fmt::Debug for RingBuffer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("cursor", &self.cursor())
            .field("gating", &self.gating_sequence())
            .field("halted", &self.is_halted())
            .field("wait_strategy", &self.wait_strategy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::status::StatusLevel;
    use crate::core::wait_strategy::BusySpinWaitStrategy;
    use std::collections::HashSet;
    use std::thread;
    use std::time::Duration;

    fn ring(capacity: usize) -> Arc<RingBuffer<u64>> {
        Arc::new(
            RingBuffer::new(capacity, || 0u64, Arc::new(BusySpinWaitStrategy))
                .expect("valid capacity"),
        )
    }

    #[test]
    fn test_size_rounding_and_clamping() {
        let status = StatusLogger::new().with_print_level(StatusLevel::Error);
        assert_eq!(calculate_ring_buffer_size(Some(200), &status), 256);
        assert_eq!(calculate_ring_buffer_size(Some(256), &status), 256);
        assert!(!status.contains(StatusLevel::Warn, "RingBufferSize"));

        assert_eq!(calculate_ring_buffer_size(Some(10), &status), MIN_RING_BUFFER_SIZE);
        assert_eq!(calculate_ring_buffer_size(Some(0), &status), MIN_RING_BUFFER_SIZE);
        assert!(status.contains(StatusLevel::Warn, "Invalid RingBufferSize 10"));

        assert_eq!(calculate_ring_buffer_size(None, &status), DEFAULT_RING_BUFFER_SIZE);
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        let result = RingBuffer::new(100, || 0u8, Arc::new(BusySpinWaitStrategy));
        assert!(matches!(result, Err(LoggerError::InvalidConfiguration { .. })));
    }

    #[test]
    fn test_claim_publish_consume() {
        let ring = ring(128);
        assert_eq!(ring.remaining_capacity(), 128);

        let seq = ring.claim_next().expect("claim");
        assert_eq!(seq, 0);
        assert!(!ring.is_available(seq));
        *ring.slot(seq) = 42;
        ring.publish(seq);
        assert!(ring.is_available(seq));
        assert_eq!(ring.remaining_capacity(), 127);
        assert!(ring.has_backlog());

        assert_eq!(*ring.slot(0), 42);
        ring.set_gating_sequence(0);
        assert_eq!(ring.remaining_capacity(), 128);
        assert!(!ring.has_backlog());
    }

    #[test]
    fn test_try_claim_fails_when_full() {
        let ring = ring(128);
        for expected in 0..128 {
            assert_eq!(ring.try_claim_next(), Some(expected));
        }
        assert_eq!(ring.try_claim_next(), None);
        assert_eq!(ring.remaining_capacity(), 0);

        ring.set_gating_sequence(0);
        assert_eq!(ring.try_claim_next(), Some(128));
    }

    #[test]
    fn test_availability_survives_wrap() {
        let ring = ring(128);
        for seq in 0..128 {
            assert_eq!(ring.claim_next().expect("claim"), seq);
            ring.publish(seq);
        }
        ring.set_gating_sequence(127);
        let wrapped = ring.claim_next().expect("claim");
        assert_eq!(wrapped, 128);
        // slot 0 still carries sequence 0's publication, not 128's
        assert!(!ring.is_available(wrapped));
        ring.publish(wrapped);
        assert!(ring.is_available(wrapped));
        assert!(!ring.is_available(0));
    }

    #[test]
    fn test_highest_published_stops_at_gap() {
        let ring = ring(128);
        for _ in 0..4 {
            ring.claim_next().expect("claim");
        }
        ring.publish(0);
        ring.publish(1);
        ring.publish(3);
        assert_eq!(ring.highest_published(0, 3), 1);
        assert_eq!(ring.highest_published(2, 3), 1);
        ring.publish(2);
        assert_eq!(ring.highest_published(0, 3), 3);
    }

    #[test]
    fn test_concurrent_claims_are_unique() {
        let ring = ring(1024);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    (0..200)
                        .map(|_| ring.claim_next().expect("claim"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            let claimed = handle.join().expect("producer panicked");
            assert!(claimed.windows(2).all(|w| w[0] < w[1]));
            for seq in claimed {
                assert!(seen.insert(seq), "sequence {} claimed twice", seq);
            }
        }
        assert_eq!(seen.len(), 800);
        assert_eq!(ring.cursor(), 799);
    }

    #[test]
    fn test_claim_blocks_until_consumer_catches_up() {
        let ring = ring(128);
        for _ in 0..128 {
            ring.claim_next().expect("claim");
        }

        let producer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || ring.claim_next())
        };
        thread::sleep(Duration::from_millis(30));
        assert!(!producer.is_finished());

        ring.set_gating_sequence(0);
        let claimed = producer.join().expect("producer panicked");
        assert_eq!(claimed.expect("claim"), 128);
    }

    #[test]
    fn test_halt_releases_blocked_producer() {
        let ring = ring(128);
        for _ in 0..128 {
            ring.claim_next().expect("claim");
        }
        let producer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || ring.claim_next())
        };
        thread::sleep(Duration::from_millis(20));
        ring.halt();
        assert!(producer.join().expect("producer panicked").is_err());
        assert_eq!(ring.try_claim_next(), None);
    }
}
