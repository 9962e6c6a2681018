//! Error types for the logger system

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// Publish attempted after the owning context started shutting down
    #[error("Logger context '{context}' has been shut down")]
    ShutDown { context: String },

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Appender returned an error while handling an event
    #[error("Appender '{appender}' failed: {message}")]
    AppenderFailure { appender: String, message: String },

    /// Appender panicked while handling an event
    #[error("Appender '{appender}' panicked: {message}")]
    AppenderPanic { appender: String, message: String },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create a post-shutdown publish error
    pub fn shut_down(context: impl Into<String>) -> Self {
        LoggerError::ShutDown {
            context: context.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create an appender failure error
    pub fn appender(appender: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::AppenderFailure {
            appender: appender.into(),
            message: message.into(),
        }
    }

    /// Create an appender panic error from a `catch_unwind` payload
    pub fn appender_panic(
        appender: impl Into<String>,
        payload: &(dyn std::any::Any + Send),
    ) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        LoggerError::AppenderPanic {
            appender: appender.into(),
            message,
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }

    /// True for the fast failure returned after shutdown began
    pub fn is_shut_down(&self) -> bool {
        matches!(self, LoggerError::ShutDown { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = LoggerError::shut_down("app");
        assert!(err.is_shut_down());

        let err = LoggerError::config("RingBuffer", "size must be positive");
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
        assert!(!err.is_shut_down());

        let err = LoggerError::appender("console", "broken pipe");
        assert!(matches!(err, LoggerError::AppenderFailure { .. }));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            LoggerError::shut_down("app").to_string(),
            "Logger context 'app' has been shut down"
        );
        assert_eq!(
            LoggerError::config("WaitStrategy", "unknown name").to_string(),
            "Invalid configuration for WaitStrategy: unknown name"
        );
        assert_eq!(
            LoggerError::appender("list", "full").to_string(),
            "Appender 'list' failed: full"
        );
    }

    #[test]
    fn test_appender_panic_payloads() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("static message");
        let err = LoggerError::appender_panic("a", payload.as_ref());
        assert_eq!(err.to_string(), "Appender 'a' panicked: static message");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        let err = LoggerError::appender_panic("b", payload.as_ref());
        assert_eq!(err.to_string(), "Appender 'b' panicked: owned");

        let payload: Box<dyn std::any::Any + Send> = Box::new(42u8);
        let err = LoggerError::appender_panic("c", payload.as_ref());
        assert_eq!(err.to_string(), "Appender 'c' panicked: Unknown panic");
    }
}
