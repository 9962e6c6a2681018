//! Configuration inputs for a logger context
//!
//! Read once at startup. Invalid values never fail: they are reported to
//! the status log and replaced with defaults, either here (for flat
//! property maps) or when the context resolves its components.

use super::error::Result;
use super::log_level::LogLevel;
use super::logger::DEFAULT_SHUTDOWN_TIMEOUT;
use super::property::Property;
use super::status::StatusLogger;
use super::wait_strategy::{
    WaitStrategyParams, DEFAULT_RETRIES, DEFAULT_SLEEP_TIME_NS, DEFAULT_TIMEOUT_MILLIS,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Prefix of flat configuration keys
pub const PROPERTY_PREFIX: &str = "AsyncLogger.";

/// Startup configuration of an asynchronous logger context
///
/// # Example
///
/// ```
/// use rust_async_logger::AsyncLoggerConfig;
///
/// let config = AsyncLoggerConfig::from_json(
///     r#"{ "ringBufferSize": 1024, "waitStrategy": "Sleep", "includeLocation": true }"#,
/// ).unwrap();
/// assert_eq!(config.ring_buffer_size, Some(1024));
/// assert!(config.synchronize_enqueue_when_full);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AsyncLoggerConfig {
    /// Name used for the consumer thread and in status messages
    pub context_name: String,
    /// Requested capacity; rounded up to a power of two, minimum 128
    pub ring_buffer_size: Option<usize>,
    /// `Block`, `Timeout`, `Sleep`, `Yield` or `BusySpin` (case-insensitive)
    pub wait_strategy: Option<String>,
    /// Spin/yield budget of the sleeping strategy
    pub retries: u32,
    pub sleep_time_ns: u64,
    /// Idle wake-up period of the timeout strategy
    pub timeout_millis: u64,
    /// `SystemClock`, `CachedClock` or `CoarseCachedClock`
    pub clock: Option<String>,
    /// `default` or `ignore`
    pub exception_handler: Option<String>,
    /// Serialize producers that block on a full ring buffer
    pub synchronize_enqueue_when_full: bool,
    /// `Default`, `Discard`, `Discard:<level>` or `Synchronous`
    pub queue_full_policy: Option<String>,
    pub discard_threshold: Option<LogLevel>,
    pub shutdown_timeout_millis: u64,
    /// Capture call-site locations (costly on hot paths)
    pub include_location: bool,
    /// Minimum level accepted by loggers of the context
    pub level: LogLevel,
    /// Properties merged into every event on the consumer thread
    pub properties: Vec<Property>,
}

impl Default for AsyncLoggerConfig {
    fn default() -> Self {
        Self {
            context_name: "default".to_string(),
            ring_buffer_size: None,
            wait_strategy: None,
            retries: DEFAULT_RETRIES,
            sleep_time_ns: DEFAULT_SLEEP_TIME_NS,
            timeout_millis: DEFAULT_TIMEOUT_MILLIS,
            clock: None,
            exception_handler: None,
            synchronize_enqueue_when_full: true,
            queue_full_policy: None,
            discard_threshold: None,
            shutdown_timeout_millis: DEFAULT_SHUTDOWN_TIMEOUT.as_millis() as u64,
            include_location: false,
            level: LogLevel::Info,
            properties: Vec::new(),
        }
    }
}

impl AsyncLoggerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build from flat `AsyncLogger.*` keys
    ///
    /// Recognized keys: `RingBufferSize`, `WaitStrategy`, `Retries`,
    /// `SleepTimeNs`, `Timeout`, `Clock`, `ExceptionHandler`,
    /// `SynchronizeEnqueueWhenQueueFull`, `QueueFullPolicy`,
    /// `DiscardThreshold`, `ShutdownTimeout`, `IncludeLocation`, `Level`,
    /// `ContextName`, and `Property.<name>`. Unknown keys and unparseable
    /// values are reported to `status` and ignored.
    pub fn from_properties<'a, I>(entries: I, status: &StatusLogger) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut config = Self::default();
        for (key, value) in entries {
            let Some(name) = key.strip_prefix(PROPERTY_PREFIX) else {
                continue;
            };
            let value = value.trim();
            match name {
                "ContextName" => config.context_name = value.to_string(),
                "RingBufferSize" => {
                    if let Some(size) = parse_or_warn::<usize>(key, value, status) {
                        config.ring_buffer_size = Some(size);
                    }
                }
                "WaitStrategy" => config.wait_strategy = Some(value.to_string()),
                "Retries" => {
                    if let Some(retries) = parse_or_warn(key, value, status) {
                        config.retries = retries;
                    }
                }
                "SleepTimeNs" => {
                    if let Some(nanos) = parse_or_warn(key, value, status) {
                        config.sleep_time_ns = nanos;
                    }
                }
                "Timeout" => {
                    if let Some(millis) = parse_or_warn(key, value, status) {
                        config.timeout_millis = millis;
                    }
                }
                "Clock" => config.clock = Some(value.to_string()),
                "ExceptionHandler" => config.exception_handler = Some(value.to_string()),
                "SynchronizeEnqueueWhenQueueFull" => {
                    if let Some(flag) = parse_or_warn(key, value, status) {
                        config.synchronize_enqueue_when_full = flag;
                    }
                }
                "QueueFullPolicy" => config.queue_full_policy = Some(value.to_string()),
                "DiscardThreshold" => {
                    if let Some(level) = parse_or_warn(key, value, status) {
                        config.discard_threshold = Some(level);
                    }
                }
                "ShutdownTimeout" => {
                    if let Some(millis) = parse_or_warn(key, value, status) {
                        config.shutdown_timeout_millis = millis;
                    }
                }
                "IncludeLocation" => {
                    if let Some(flag) = parse_or_warn(key, value, status) {
                        config.include_location = flag;
                    }
                }
                "Level" => {
                    if let Some(level) = parse_or_warn(key, value, status) {
                        config.level = level;
                    }
                }
                other => match other.strip_prefix("Property.") {
                    Some(property) if !property.is_empty() => {
                        config.properties.push(Property::new(property, value));
                    }
                    _ => status.warn(format!("Ignoring unknown configuration key '{}'", key)),
                },
            }
        }
        config
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_millis)
    }

    pub fn wait_strategy_params(&self) -> WaitStrategyParams {
        WaitStrategyParams {
            retries: self.retries,
            sleep_time: Duration::from_nanos(self.sleep_time_ns),
            timeout: Duration::from_millis(self.timeout_millis.max(1)),
        }
    }
}

fn parse_or_warn<T>(key: &str, value: &str, status: &StatusLogger) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            status.warn(format!(
                "Invalid value '{}' for {} ({}), using default",
                value, key, e
            ));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::status::StatusLevel;

    fn quiet() -> StatusLogger {
        StatusLogger::new().with_print_level(StatusLevel::Error)
    }

    #[test]
    fn test_defaults() {
        let config = AsyncLoggerConfig::default();
        assert_eq!(config.ring_buffer_size, None);
        assert!(config.synchronize_enqueue_when_full);
        assert_eq!(config.shutdown_timeout(), DEFAULT_SHUTDOWN_TIMEOUT);
        assert_eq!(config.wait_strategy_params(), WaitStrategyParams::default());
        assert_eq!(config.level, LogLevel::Info);
    }

    #[test]
    fn test_json_round_trip_keeps_properties() {
        let mut config = AsyncLoggerConfig::default();
        config.properties.push(Property::new("service", "api"));
        config.wait_strategy = Some("Yield".to_string());
        let json = config.to_json().expect("serialize");
        let parsed = AsyncLoggerConfig::from_json(&json).expect("deserialize");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_json_partial_document_uses_defaults() {
        let config = AsyncLoggerConfig::from_json(r#"{"clock":"CachedClock"}"#).expect("json");
        assert_eq!(config.clock.as_deref(), Some("CachedClock"));
        assert_eq!(config.retries, DEFAULT_RETRIES);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(AsyncLoggerConfig::from_json("{ not json").is_err());
    }

    #[test]
    fn test_from_properties() {
        let status = quiet();
        let config = AsyncLoggerConfig::from_properties(
            [
                ("AsyncLogger.RingBufferSize", "512"),
                ("AsyncLogger.WaitStrategy", "busyspin"),
                ("AsyncLogger.SynchronizeEnqueueWhenQueueFull", "false"),
                ("AsyncLogger.QueueFullPolicy", "Discard"),
                ("AsyncLogger.DiscardThreshold", "warn"),
                ("AsyncLogger.ShutdownTimeout", "250"),
                ("AsyncLogger.Property.service", "orders"),
                ("unrelated.key", "x"),
            ],
            &status,
        );
        assert_eq!(config.ring_buffer_size, Some(512));
        assert_eq!(config.wait_strategy.as_deref(), Some("busyspin"));
        assert!(!config.synchronize_enqueue_when_full);
        assert_eq!(config.discard_threshold, Some(LogLevel::Warn));
        assert_eq!(config.shutdown_timeout(), Duration::from_millis(250));
        assert_eq!(config.properties, vec![Property::new("service", "orders")]);
        assert!(status.entries().is_empty());
    }

    #[test]
    fn test_bad_values_fall_back_with_warning() {
        let status = quiet();
        let config = AsyncLoggerConfig::from_properties(
            [
                ("AsyncLogger.RingBufferSize", "lots"),
                ("AsyncLogger.IncludeLocation", "maybe"),
                ("AsyncLogger.Frobnicate", "1"),
            ],
            &status,
        );
        assert_eq!(config.ring_buffer_size, None);
        assert!(!config.include_location);
        assert!(status.contains(StatusLevel::Warn, "'lots'"));
        assert!(status.contains(StatusLevel::Warn, "'maybe'"));
        assert!(status.contains(StatusLevel::Warn, "Frobnicate"));
    }
}
