//! Console appender implementation

use crate::core::{Appender, LogEvent, LogLevel, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use std::io::Write;

/// Default timestamp layout, millisecond precision
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

pub struct ConsoleAppender {
    name: String,
    use_colors: bool,
    timestamp_format: String,
    show_location: bool,
}

impl ConsoleAppender {
    pub fn new() -> Self {
        Self {
            name: "console".to_string(),
            use_colors: true,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            show_location: true,
        }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self {
            use_colors,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set a custom timestamp format using a strftime-compatible format string
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_async_logger::appenders::ConsoleAppender;
    ///
    /// let appender = ConsoleAppender::new()
    ///     .with_timestamp_format("%d/%b/%Y:%H:%M:%S %z");
    /// ```
    #[must_use]
    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }

    /// Print call-site locations when the context captures them
    #[must_use]
    pub fn with_location(mut self, show: bool) -> Self {
        self.show_location = show;
        self
    }

    fn format_timestamp(&self, millis: i64) -> String {
        match DateTime::<Utc>::from_timestamp_millis(millis) {
            Some(time) => time.format(&self.timestamp_format).to_string(),
            None => millis.to_string(),
        }
    }

    /// Format as text with optional colors
    pub fn format_event(&self, event: &LogEvent) -> String {
        let level_str = if self.use_colors {
            format!("{:5}", event.level().to_str())
                .color(event.level().color_code())
                .to_string()
        } else {
            format!("{:5}", event.level().to_str())
        };

        let mut line = format!(
            "[{}] [{}] [{}] {} - {}",
            self.format_timestamp(event.timestamp()),
            level_str,
            event.thread_name(),
            event.logger_name(),
            event.message()
        );

        if let Some(marker) = event.marker() {
            line.push_str(&format!(" <{}>", marker));
        }
        if !event.context_map().is_empty() {
            line.push(' ');
            line.push_str(&event.context_map().format_fields());
        }
        if !event.context_stack().is_empty() {
            line.push_str(&format!(" {}", event.context_stack()));
        }
        if self.show_location {
            if let Some(source) = event.source() {
                line.push_str(&format!(" at {}", source));
            }
        }
        if let Some(thrown) = event.thrown() {
            line.push_str(&format!("\n    caused by: {}", thrown));
        }
        line
    }
}

impl Default for ConsoleAppender {
    fn default() -> Self {
        Self::new()
    }
}

impl Appender for ConsoleAppender {
    fn append(&mut self, event: &LogEvent) -> Result<()> {
        let output = self.format_event(event);

        // Route Error and Fatal levels to stderr, others to stdout
        match event.level() {
            LogLevel::Error | LogLevel::Fatal => writeln!(std::io::stderr().lock(), "{}", output)?,
            _ => writeln!(std::io::stdout().lock(), "{}", output)?,
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        // Flush both stdout and stderr since we write to both
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
