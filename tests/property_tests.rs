//! Property-based tests for rust_async_logger using proptest

use proptest::prelude::*;
use rust_async_logger::core::property::substitute;
use rust_async_logger::core::{
    calculate_ring_buffer_size, BusySpinWaitStrategy, RingBuffer, StatusLevel, StatusLogger,
    MAX_RING_BUFFER_SIZE, MIN_RING_BUFFER_SIZE,
};
use rust_async_logger::prelude::*;
use std::sync::Arc;

fn any_level() -> impl Strategy<Value = LogLevel> {
    prop_oneof![
        Just(LogLevel::Trace),
        Just(LogLevel::Debug),
        Just(LogLevel::Info),
        Just(LogLevel::Warn),
        Just(LogLevel::Error),
        Just(LogLevel::Fatal),
    ]
}

fn quiet_status() -> StatusLogger {
    StatusLogger::new().with_print_level(StatusLevel::Error)
}

// ============================================================================
// Ring Buffer Sizing Tests
// ============================================================================

proptest! {
    /// Any requested size yields a power of two within [max(n, 128), 2 * max(n, 128))
    #[test]
    fn test_ring_buffer_size_is_bounded_power_of_two(requested in 0usize..1_000_000) {
        let size = calculate_ring_buffer_size(Some(requested), &quiet_status());
        let floor = requested.max(MIN_RING_BUFFER_SIZE);

        prop_assert!(size.is_power_of_two());
        prop_assert!(size >= floor);
        prop_assert!(size < floor * 2);
        prop_assert!(size <= MAX_RING_BUFFER_SIZE);
    }

    /// Claimed sequences are handed out contiguously from zero
    #[test]
    fn test_ring_buffer_claims_are_contiguous(count in 1usize..128) {
        let ring = RingBuffer::new(128, || 0u64, Arc::new(BusySpinWaitStrategy))
            .expect("valid capacity");
        let claimed: Vec<i64> = (0..count)
            .map(|_| ring.try_claim_next().expect("free slot"))
            .collect();
        let expected: Vec<i64> = (0..count as i64).collect();
        prop_assert_eq!(claimed, expected);
        prop_assert_eq!(ring.remaining_capacity(), 128 - count);
    }
}

// ============================================================================
// Name Resolution Tests
// ============================================================================

proptest! {
    /// Wait strategy names are case-insensitive
    #[test]
    fn test_wait_strategy_names_ignore_case(
        kind in prop_oneof![
            Just(WaitStrategyKind::Blocking),
            Just(WaitStrategyKind::Sleeping),
            Just(WaitStrategyKind::Yielding),
            Just(WaitStrategyKind::BusySpin),
            Just(WaitStrategyKind::TimeoutBlocking),
        ],
        mask in prop::collection::vec(any::<bool>(), 16)
    ) {
        let name: String = kind
            .to_string()
            .chars()
            .zip(mask.iter().cycle())
            .map(|(c, upper)| if *upper { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() })
            .collect();
        let parsed: WaitStrategyKind = name.parse().expect("known strategy name");
        prop_assert_eq!(parsed, kind);
    }

    /// LogLevel string conversions roundtrip
    #[test]
    fn test_log_level_str_roundtrip(level in any_level()) {
        let parsed: LogLevel = level.to_str().parse().expect("level name");
        prop_assert_eq!(level, parsed);
    }
}

// ============================================================================
// Queue-Full Routing Tests
// ============================================================================

proptest! {
    /// Discard drops exactly the levels at or below the threshold
    #[test]
    fn test_discard_routing_follows_threshold(level in any_level(), threshold in any_level()) {
        let policy = QueueFullPolicy::Discard { threshold };
        let route = policy.route(level, false);
        if level <= threshold {
            prop_assert_eq!(route, EventRoute::Discard);
        } else {
            prop_assert_eq!(route, EventRoute::Enqueue);
        }
    }

    /// The consumer thread never waits on its own ring buffer
    #[test]
    fn test_consumer_thread_never_enqueues(level in any_level()) {
        for policy in [QueueFullPolicy::Default, QueueFullPolicy::Synchronous] {
            prop_assert_eq!(policy.route(level, true), EventRoute::Synchronous);
        }
    }
}

// ============================================================================
// Property Lookup Tests
// ============================================================================

proptest! {
    /// Values without lookups are returned unchanged
    #[test]
    fn test_substitute_without_lookup_is_identity(value in "[^$]{0,64}") {
        let context = ContextMap::new();
        prop_assert_eq!(substitute(&value, &context), value);
    }

    /// Context lookups resolve to the stored value
    #[test]
    fn test_substitute_resolves_context_values(
        key in "[a-z]{1,12}",
        value in "[a-zA-Z0-9 ]{0,32}",
        prefix in "[a-z]{0,8}"
    ) {
        let mut context = ContextMap::new();
        context.insert(key.clone(), value.clone());
        let template = format!("{}${{ctx:{}}}", prefix, key);
        prop_assert_eq!(substitute(&template, &context), format!("{}{}", prefix, value));
    }
}
