//! Wait strategies for the consumer thread
//!
//! In order of increasing CPU usage and decreasing latency:
//! [`TimeoutBlockingWaitStrategy`], [`BlockingWaitStrategy`],
//! [`SleepingWaitStrategy`], [`YieldingWaitStrategy`],
//! [`BusySpinWaitStrategy`].
//!
//! A strategy waits until the producer cursor reaches a target sequence.
//! Every strategy also watches an alert flag so the consumer can be woken
//! for shutdown.

use super::status::StatusLogger;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Default sleep between retries of [`SleepingWaitStrategy`]
pub const DEFAULT_SLEEP_TIME_NS: u64 = 100;

/// Default retry budget of [`SleepingWaitStrategy`]
pub const DEFAULT_RETRIES: u32 = 200;

/// Default idle wake-up period of [`TimeoutBlockingWaitStrategy`]
pub const DEFAULT_TIMEOUT_MILLIS: u64 = 10;

const SPIN_TRIES: u32 = 100;

/// Result of a single wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The cursor reached at least the target; carries the cursor value
    Available(i64),
    /// No new data within the strategy's idle period
    TimedOut,
    /// The alert flag was raised
    Alerted,
}

pub trait WaitStrategy: Send + Sync + fmt::Debug {
    /// Wait until `cursor >= sequence`, the alert flag is set, or an idle
    /// period elapses (for strategies that have one)
    fn wait_for(&self, sequence: i64, cursor: &AtomicI64, alert: &AtomicBool) -> WaitOutcome;

    /// Wake consumers parked inside `wait_for`
    fn signal_all_when_blocking(&self);
}

#[inline]
fn check(sequence: i64, cursor: &AtomicI64, alert: &AtomicBool) -> Option<WaitOutcome> {
    if alert.load(Ordering::Acquire) {
        return Some(WaitOutcome::Alerted);
    }
    let available = cursor.load(Ordering::Acquire);
    if available >= sequence {
        return Some(WaitOutcome::Available(available));
    }
    None
}

/// Mutex and condition variable; lowest CPU, highest latency
#[derive(Debug, Default)]
pub struct BlockingWaitStrategy {
    lock: Mutex<()>,
    condvar: Condvar,
}

impl BlockingWaitStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_for(&self, sequence: i64, cursor: &AtomicI64, alert: &AtomicBool) -> WaitOutcome {
        if let Some(outcome) = check(sequence, cursor, alert) {
            return outcome;
        }
        let mut guard = self.lock.lock();
        loop {
            if let Some(outcome) = check(sequence, cursor, alert) {
                return outcome;
            }
            self.condvar.wait(&mut guard);
        }
    }

    fn signal_all_when_blocking(&self) {
        let _guard = self.lock.lock();
        self.condvar.notify_all();
    }
}

/// Like [`BlockingWaitStrategy`] but wakes after `timeout` without new data
#[derive(Debug)]
pub struct TimeoutBlockingWaitStrategy {
    lock: Mutex<()>,
    condvar: Condvar,
    timeout: Duration,
}

impl TimeoutBlockingWaitStrategy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            lock: Mutex::new(()),
            condvar: Condvar::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for TimeoutBlockingWaitStrategy {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TIMEOUT_MILLIS))
    }
}

impl WaitStrategy for TimeoutBlockingWaitStrategy {
    fn wait_for(&self, sequence: i64, cursor: &AtomicI64, alert: &AtomicBool) -> WaitOutcome {
        if let Some(outcome) = check(sequence, cursor, alert) {
            return outcome;
        }
        let mut guard = self.lock.lock();
        loop {
            if let Some(outcome) = check(sequence, cursor, alert) {
                return outcome;
            }
            if self.condvar.wait_for(&mut guard, self.timeout).timed_out() {
                return check(sequence, cursor, alert).unwrap_or(WaitOutcome::TimedOut);
            }
        }
    }

    fn signal_all_when_blocking(&self) {
        let _guard = self.lock.lock();
        self.condvar.notify_all();
    }
}

/// Spin, then yield, then sleep `sleep_time` between checks
#[derive(Debug, Clone)]
pub struct SleepingWaitStrategy {
    retries: u32,
    sleep_time: Duration,
}

impl SleepingWaitStrategy {
    pub fn new(retries: u32, sleep_time: Duration) -> Self {
        Self {
            retries,
            sleep_time,
        }
    }
}

impl Default for SleepingWaitStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRIES, Duration::from_nanos(DEFAULT_SLEEP_TIME_NS))
    }
}

impl WaitStrategy for SleepingWaitStrategy {
    fn wait_for(&self, sequence: i64, cursor: &AtomicI64, alert: &AtomicBool) -> WaitOutcome {
        let mut counter = self.retries;
        loop {
            if let Some(outcome) = check(sequence, cursor, alert) {
                return outcome;
            }
            if counter > SPIN_TRIES {
                counter -= 1;
                std::hint::spin_loop();
            } else if counter > 0 {
                counter -= 1;
                thread::yield_now();
            } else {
                thread::sleep(self.sleep_time);
            }
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Spin briefly, then yield on every iteration
#[derive(Debug, Default, Clone, Copy)]
pub struct YieldingWaitStrategy;

impl WaitStrategy for YieldingWaitStrategy {
    fn wait_for(&self, sequence: i64, cursor: &AtomicI64, alert: &AtomicBool) -> WaitOutcome {
        let mut counter = SPIN_TRIES;
        loop {
            if let Some(outcome) = check(sequence, cursor, alert) {
                return outcome;
            }
            if counter == 0 {
                thread::yield_now();
            } else {
                counter -= 1;
                std::hint::spin_loop();
            }
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Pure spin loop; highest CPU, lowest latency
#[derive(Debug, Default, Clone, Copy)]
pub struct BusySpinWaitStrategy;

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait_for(&self, sequence: i64, cursor: &AtomicI64, alert: &AtomicBool) -> WaitOutcome {
        loop {
            if let Some(outcome) = check(sequence, cursor, alert) {
                return outcome;
            }
            std::hint::spin_loop();
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Wait strategy selection by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WaitStrategyKind {
    Blocking,
    Sleeping,
    Yielding,
    BusySpin,
    #[default]
    TimeoutBlocking,
}

impl fmt::Display for WaitStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitStrategyKind::Blocking => write!(f, "Block"),
            WaitStrategyKind::Sleeping => write!(f, "Sleep"),
            WaitStrategyKind::Yielding => write!(f, "Yield"),
            WaitStrategyKind::BusySpin => write!(f, "BusySpin"),
            WaitStrategyKind::TimeoutBlocking => write!(f, "Timeout"),
        }
    }
}

impl FromStr for WaitStrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "block" | "blocking" => Ok(WaitStrategyKind::Blocking),
            "sleep" | "sleeping" => Ok(WaitStrategyKind::Sleeping),
            "yield" | "yielding" => Ok(WaitStrategyKind::Yielding),
            "busyspin" => Ok(WaitStrategyKind::BusySpin),
            "timeout" | "timeoutblocking" => Ok(WaitStrategyKind::TimeoutBlocking),
            _ => Err(format!("Unknown wait strategy: '{}'", s)),
        }
    }
}

/// Tuning parameters shared by the named strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitStrategyParams {
    pub retries: u32,
    pub sleep_time: Duration,
    pub timeout: Duration,
}

impl Default for WaitStrategyParams {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            sleep_time: Duration::from_nanos(DEFAULT_SLEEP_TIME_NS),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MILLIS),
        }
    }
}

impl WaitStrategyKind {
    pub fn create(self, params: &WaitStrategyParams) -> Arc<dyn WaitStrategy> {
        match self {
            WaitStrategyKind::Blocking => Arc::new(BlockingWaitStrategy::new()),
            WaitStrategyKind::Sleeping => {
                Arc::new(SleepingWaitStrategy::new(params.retries, params.sleep_time))
            }
            WaitStrategyKind::Yielding => Arc::new(YieldingWaitStrategy),
            WaitStrategyKind::BusySpin => Arc::new(BusySpinWaitStrategy),
            WaitStrategyKind::TimeoutBlocking => {
                Arc::new(TimeoutBlockingWaitStrategy::new(params.timeout))
            }
        }
    }
}

/// Resolve a configured name (case-insensitive)
///
/// Missing or unrecognized names resolve to [`TimeoutBlockingWaitStrategy`];
/// an unrecognized name is reported to `status`.
pub fn resolve_wait_strategy_kind(name: Option<&str>, status: &StatusLogger) -> WaitStrategyKind {
    match name {
        None => WaitStrategyKind::default(),
        Some(name) => name.parse().unwrap_or_else(|e: String| {
            status.warn(format!(
                "{}, using {} instead",
                e,
                WaitStrategyKind::default()
            ));
            WaitStrategyKind::default()
        }),
    }
}

pub fn create_wait_strategy(
    name: Option<&str>,
    params: &WaitStrategyParams,
    status: &StatusLogger,
) -> Arc<dyn WaitStrategy> {
    let kind = resolve_wait_strategy_kind(name, status);
    status.debug(format!("Using {} wait strategy", kind));
    kind.create(params)
}
