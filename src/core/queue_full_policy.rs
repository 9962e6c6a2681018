//! Routing decisions for events that find the ring buffer full
//!
//! When a producer cannot claim a slot without waiting, the configured
//! policy decides whether the event waits for space, is written on the
//! caller's thread, or is dropped.

use super::log_level::LogLevel;
use super::status::StatusLogger;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// What to do with an event that could not be enqueued immediately
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventRoute {
    /// Wait for a free slot, then publish
    Enqueue,
    /// Bypass the ring buffer and call the appenders on the caller's thread
    Synchronous,
    /// Drop the event
    Discard,
}

impl fmt::Display for EventRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventRoute::Enqueue => write!(f, "Enqueue"),
            EventRoute::Synchronous => write!(f, "Synchronous"),
            EventRoute::Discard => write!(f, "Discard"),
        }
    }
}

/// Policy for a full ring buffer
///
/// # Example
///
/// ```
/// use rust_async_logger::{EventRoute, LogLevel, QueueFullPolicy};
///
/// let policy = QueueFullPolicy::Discard { threshold: LogLevel::Info };
/// assert_eq!(policy.route(LogLevel::Debug, false), EventRoute::Discard);
/// assert_eq!(policy.route(LogLevel::Error, false), EventRoute::Enqueue);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QueueFullPolicy {
    /// Wait for space; the consumer thread itself writes synchronously
    #[default]
    Default,

    /// Drop events at or below `threshold`, wait for space otherwise
    Discard { threshold: LogLevel },

    /// Always write on the caller's thread
    Synchronous,
}

impl QueueFullPolicy {
    /// Route an event of `level`
    ///
    /// `on_consumer_thread` is true when the consumer itself is logging
    /// (for example from inside an appender); waiting there would deadlock.
    pub fn route(&self, level: LogLevel, on_consumer_thread: bool) -> EventRoute {
        match self {
            QueueFullPolicy::Discard { threshold } if level <= *threshold => EventRoute::Discard,
            QueueFullPolicy::Synchronous => EventRoute::Synchronous,
            _ if on_consumer_thread => EventRoute::Synchronous,
            _ => EventRoute::Enqueue,
        }
    }
}

impl fmt::Display for QueueFullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueFullPolicy::Default => write!(f, "Default"),
            QueueFullPolicy::Discard { threshold } => write!(f, "Discard({})", threshold),
            QueueFullPolicy::Synchronous => write!(f, "Synchronous"),
        }
    }
}

impl FromStr for QueueFullPolicy {
    type Err = String;

    /// Parses `Default`, `Synchronous`, `Discard` (threshold `Info`) or
    /// `Discard:<level>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (name, threshold) = match trimmed.split_once(':') {
            Some((name, level)) => (name, Some(level)),
            None => (trimmed, None),
        };
        match name.to_ascii_lowercase().as_str() {
            "default" | "enqueue" => Ok(QueueFullPolicy::Default),
            "synchronous" | "sync" => Ok(QueueFullPolicy::Synchronous),
            "discard" | "discarding" => {
                let threshold = match threshold {
                    Some(level) => level.parse()?,
                    None => LogLevel::Info,
                };
                Ok(QueueFullPolicy::Discard { threshold })
            }
            _ => Err(format!("Unknown queue full policy: '{}'", s)),
        }
    }
}

/// Resolve a configured policy name, falling back to
/// [`QueueFullPolicy::Default`]
pub fn resolve_queue_full_policy(
    name: Option<&str>,
    discard_threshold: Option<LogLevel>,
    status: &StatusLogger,
) -> QueueFullPolicy {
    let policy = match name {
        None => QueueFullPolicy::Default,
        Some(name) => name.parse().unwrap_or_else(|e: String| {
            status.warn(format!("{}, using Default instead", e));
            QueueFullPolicy::Default
        }),
    };
    match (policy, discard_threshold) {
        (QueueFullPolicy::Discard { .. }, Some(threshold)) => QueueFullPolicy::Discard { threshold },
        (policy, _) => policy,
    }
}

/// Callback for discard notifications
///
/// Called when events are discarded because the ring buffer was full.
/// The parameter is the total count of discarded events so far.
pub type DiscardCallback = Arc<dyn Fn(u64) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::status::StatusLevel;

    #[test]
    fn test_default_policy_routes() {
        let policy = QueueFullPolicy::default();
        for level in LogLevel::ALL {
            assert_eq!(policy.route(level, false), EventRoute::Enqueue);
            assert_eq!(policy.route(level, true), EventRoute::Synchronous);
        }
    }

    #[test]
    fn test_discard_policy_threshold() {
        let policy = QueueFullPolicy::Discard {
            threshold: LogLevel::Warn,
        };
        assert_eq!(policy.route(LogLevel::Trace, false), EventRoute::Discard);
        assert_eq!(policy.route(LogLevel::Warn, false), EventRoute::Discard);
        assert_eq!(policy.route(LogLevel::Warn, true), EventRoute::Discard);
        assert_eq!(policy.route(LogLevel::Error, false), EventRoute::Enqueue);
        assert_eq!(policy.route(LogLevel::Error, true), EventRoute::Synchronous);
    }

    #[test]
    fn test_synchronous_policy() {
        let policy = QueueFullPolicy::Synchronous;
        assert_eq!(policy.route(LogLevel::Info, false), EventRoute::Synchronous);
    }

    #[test]
    fn test_parsing() {
        assert_eq!("default".parse::<QueueFullPolicy>(), Ok(QueueFullPolicy::Default));
        assert_eq!(
            "Discard".parse::<QueueFullPolicy>(),
            Ok(QueueFullPolicy::Discard {
                threshold: LogLevel::Info
            })
        );
        assert_eq!(
            "discard:debug".parse::<QueueFullPolicy>(),
            Ok(QueueFullPolicy::Discard {
                threshold: LogLevel::Debug
            })
        );
        assert!("discard:loud".parse::<QueueFullPolicy>().is_err());
        assert!("drop-everything".parse::<QueueFullPolicy>().is_err());
    }

    #[test]
    fn test_resolution_fallback_and_threshold_override() {
        let status = StatusLogger::new().with_print_level(StatusLevel::Error);
        assert_eq!(
            resolve_queue_full_policy(Some("Nope"), None, &status),
            QueueFullPolicy::Default
        );
        assert!(status.contains(StatusLevel::Warn, "Nope"));

        assert_eq!(
            resolve_queue_full_policy(Some("Discard"), Some(LogLevel::Warn), &status),
            QueueFullPolicy::Discard {
                threshold: LogLevel::Warn
            }
        );
        assert_eq!(
            resolve_queue_full_policy(None, Some(LogLevel::Warn), &status),
            QueueFullPolicy::Default
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(QueueFullPolicy::Default.to_string(), "Default");
        assert_eq!(
            QueueFullPolicy::Discard {
                threshold: LogLevel::Info
            }
            .to_string(),
            "Discard(INFO)"
        );
        assert_eq!(EventRoute::Synchronous.to_string(), "Synchronous");
    }
}
