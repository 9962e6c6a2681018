//! Timestamp sources with a tunable accuracy/speed tradeoff
//!
//! - [`SystemClock`]: reads the system time on every call.
//! - [`CachedClock`]: a background thread refreshes a shared millisecond
//!   value about once per millisecond; every 1024th read on a thread refreshes
//!   the shared value from the system time. The value never moves backwards.
//! - [`CoarseCachedClock`]: same updater, readers never bypass the cache.
//!
//! The clock is chosen once when a context is built and never switched.

use super::status::StatusLogger;
use crossbeam_utils::CachePadded;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Reads between forced refreshes of [`CachedClock`] (must be a power of two)
pub const CACHED_CLOCK_REFRESH_INTERVAL: u32 = 1024;

/// Period between updates of the shared cached value
pub const CACHED_CLOCK_UPDATE_PERIOD: Duration = Duration::from_millis(1);

/// Documented staleness bound of [`CachedClock`]
pub const CACHED_CLOCK_STALENESS: Duration = Duration::from_millis(1);

/// Documented staleness bound of [`CoarseCachedClock`]
pub const COARSE_CLOCK_STALENESS: Duration = Duration::from_millis(16);

/// Source of event timestamps in milliseconds since the Unix epoch
pub trait Clock: Send + Sync + fmt::Debug {
    fn current_time_millis(&self) -> i64;
}

#[inline]
fn system_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Precise clock: one system call per read
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn current_time_millis(&self) -> i64 {
        system_millis()
    }
}

/// Background thread that keeps a shared millisecond value fresh
///
/// The updater is the only writer of the value. It stops when the owning
/// clock is dropped.
struct ClockUpdater {
    millis: Arc<CachePadded<AtomicI64>>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ClockUpdater {
    fn spawn(name: &str) -> Self {
        let millis = Arc::new(CachePadded::new(AtomicI64::new(system_millis())));
        let running = Arc::new(AtomicBool::new(true));

        let shared = Arc::clone(&millis);
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while flag.load(Ordering::Relaxed) {
                    shared.fetch_max(system_millis(), Ordering::AcqRel);
                    thread::park_timeout(CACHED_CLOCK_UPDATE_PERIOD);
                }
            });

        // Without an updater thread the value would freeze; readers of a
        // failed updater fall back to the system clock.
        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                StatusLogger::global().error(format!(
                    "Failed to start clock updater thread '{}': {}",
                    name, e
                ));
                running.store(false, Ordering::Relaxed);
                None
            }
        };

        Self {
            millis,
            running,
            handle,
        }
    }

    #[inline]
    fn read(&self) -> i64 {
        if self.handle.is_some() {
            self.millis.load(Ordering::Acquire)
        } else {
            system_millis()
        }
    }

    /// Read the system time and publish it to every reader
    ///
    /// The shared value only moves forward, whether written here or by the
    /// updater thread.
    fn refresh(&self) -> i64 {
        let now = system_millis();
        if self.handle.is_none() {
            return now;
        }
        self.millis.fetch_max(now, Ordering::AcqRel).max(now)
    }
}

thread_local! {
    /// Per-thread read counter for [`CachedClock`]'s forced refreshes
    static CACHED_READS: Cell<u32> = Cell::new(0);
}

impl Drop for ClockUpdater {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

impl fmt::Debug for ClockUpdater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockUpdater")
            .field("millis", &self.millis.load(Ordering::Relaxed))
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish()
    }
}

/// Cached clock with bounded drift
///
/// Reads are a single atomic load. Every [`CACHED_CLOCK_REFRESH_INTERVAL`]th
/// read on a thread refreshes the shared value from the system time, which
/// bounds the drift when the updater thread is starved.
#[derive(Debug)]
pub struct CachedClock {
    updater: ClockUpdater,
}

impl CachedClock {
    pub fn new() -> Self {
        Self {
            updater: ClockUpdater::spawn("cached-clock-updater"),
        }
    }
}

impl Default for CachedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for CachedClock {
    #[inline]
    fn current_time_millis(&self) -> i64 {
        let n = CACHED_READS.with(|reads| {
            let n = reads.get().wrapping_add(1);
            reads.set(n);
            n
        });
        if n & (CACHED_CLOCK_REFRESH_INTERVAL - 1) == 0 {
            return self.updater.refresh();
        }
        self.updater.read()
    }
}

/// Coarse cached clock: never forces a refresh
#[derive(Debug)]
pub struct CoarseCachedClock {
    updater: ClockUpdater,
}

impl CoarseCachedClock {
    pub fn new() -> Self {
        Self {
            updater: ClockUpdater::spawn("coarse-clock-updater"),
        }
    }
}

impl Default for CoarseCachedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for CoarseCachedClock {
    #[inline]
    fn current_time_millis(&self) -> i64 {
        self.updater.read()
    }
}

/// Clock selection by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClockKind {
    #[default]
    System,
    Cached,
    CoarseCached,
}

impl ClockKind {
    pub fn create(self) -> Arc<dyn Clock> {
        match self {
            ClockKind::System => Arc::new(SystemClock),
            ClockKind::Cached => Arc::new(CachedClock::new()),
            ClockKind::CoarseCached => Arc::new(CoarseCachedClock::new()),
        }
    }

    /// Upper bound on how stale a read may be
    pub fn staleness_bound(self) -> Duration {
        match self {
            ClockKind::System => Duration::ZERO,
            ClockKind::Cached => CACHED_CLOCK_STALENESS,
            ClockKind::CoarseCached => COARSE_CLOCK_STALENESS,
        }
    }
}

impl fmt::Display for ClockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockKind::System => write!(f, "SystemClock"),
            ClockKind::Cached => write!(f, "CachedClock"),
            ClockKind::CoarseCached => write!(f, "CoarseCachedClock"),
        }
    }
}

impl FromStr for ClockKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" | "systemclock" | "precise" => Ok(ClockKind::System),
            "cached" | "cachedclock" => Ok(ClockKind::Cached),
            "coarse" | "coarsecached" | "coarsecachedclock" => Ok(ClockKind::CoarseCached),
            _ => Err(format!("Unknown clock: '{}'", s)),
        }
    }
}

/// Resolve a configured clock name, falling back to [`SystemClock`]
///
/// An unknown name is reported to `status` and never fails.
pub fn create_clock(name: Option<&str>, status: &StatusLogger) -> Arc<dyn Clock> {
    let kind = match name {
        None => ClockKind::System,
        Some(name) => match name.parse::<ClockKind>() {
            Ok(kind) => kind,
            Err(e) => {
                status.warn(format!("{}, using SystemClock instead", e));
                ClockKind::System
            }
        },
    };
    status.debug(format!("Using {} for timestamps", kind));
    kind.create()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::status::StatusLevel;
    use std::time::Instant;

    fn quiet_status() -> StatusLogger {
        StatusLogger::new().with_print_level(StatusLevel::Error)
    }

    #[test]
    fn test_system_clock_tracks_wall_time() {
        let before = system_millis();
        let now = SystemClock.current_time_millis();
        let after = system_millis();
        assert!(before <= now && now <= after);
    }

    #[test]
    fn test_cached_clock_stays_close_to_system_time() {
        let clock = CachedClock::new();
        for _ in 0..50 {
            let cached = clock.current_time_millis();
            let precise = system_millis();
            // generous margin for scheduler hiccups on loaded CI machines
            assert!((precise - cached).abs() <= 50, "drift {}ms", precise - cached);
            thread::sleep(Duration::from_millis(2));
        }
    }

    /// Upper bound for the gap between two reads taken `elapsed` apart
    fn allowed_step(elapsed: Duration, bound: Duration) -> i64 {
        (elapsed + bound + CACHED_CLOCK_UPDATE_PERIOD).as_millis() as i64 + 1
    }

    #[test]
    fn test_cached_clock_reads_are_monotonic_and_bounded() {
        let clock = CachedClock::new();
        let deadline = Instant::now() + Duration::from_millis(300);
        let mut previous = clock.current_time_millis();
        let mut previous_at = Instant::now();
        let mut reads = 0u32;

        while Instant::now() < deadline {
            let now = clock.current_time_millis();
            let step = now - previous;
            assert!(step >= 0, "clock stepped back by {}ms", -step);
            let limit = allowed_step(previous_at.elapsed(), CACHED_CLOCK_STALENESS);
            assert!(step <= limit, "step {}ms exceeds {}ms", step, limit);
            previous = now;
            previous_at = Instant::now();
            reads += 1;
        }
        assert!(reads > CACHED_CLOCK_REFRESH_INTERVAL);
    }

    #[test]
    fn test_forced_refresh_is_visible_to_other_readers() {
        let clock = Arc::new(CachedClock::new());
        let refreshed = (0..CACHED_CLOCK_REFRESH_INTERVAL)
            .map(|_| clock.current_time_millis())
            .max()
            .unwrap_or_default();

        let reader = Arc::clone(&clock);
        let seen = thread::spawn(move || reader.current_time_millis())
            .join()
            .expect("reader thread");
        assert!(seen >= refreshed, "{} older than {}", seen, refreshed);
    }

    #[test]
    fn test_coarse_clock_never_steps_back() {
        let clock = CoarseCachedClock::new();
        let mut previous = clock.current_time_millis();
        for _ in 0..100_000 {
            let now = clock.current_time_millis();
            assert!(now >= previous);
            previous = now;
        }
    }

    #[test]
    fn test_coarse_clock_advances() {
        let clock = CoarseCachedClock::new();
        let first = clock.current_time_millis();
        thread::sleep(Duration::from_millis(40));
        let second = clock.current_time_millis();
        assert!(second > first);
    }

    #[test]
    fn test_clock_kind_parsing() {
        assert_eq!("CachedClock".parse::<ClockKind>(), Ok(ClockKind::Cached));
        assert_eq!("coarse".parse::<ClockKind>(), Ok(ClockKind::CoarseCached));
        assert_eq!("PRECISE".parse::<ClockKind>(), Ok(ClockKind::System));
        assert!("org.example.NanoClock".parse::<ClockKind>().is_err());
    }

    #[test]
    fn test_unknown_clock_falls_back_to_system() {
        let status = quiet_status();
        let clock = create_clock(Some("com.example.MissingClock"), &status);
        assert!(format!("{:?}", clock).contains("SystemClock"));
        assert!(status.contains(StatusLevel::Warn, "MissingClock"));
    }

    #[test]
    fn test_staleness_bounds_are_ordered() {
        assert!(ClockKind::System.staleness_bound() < ClockKind::Cached.staleness_bound());
        assert!(ClockKind::Cached.staleness_bound() < ClockKind::CoarseCached.staleness_bound());
    }
}
