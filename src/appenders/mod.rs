//! Appender implementations

#[cfg(feature = "console")]
pub mod console;
pub mod list;

#[cfg(feature = "console")]
pub use console::ConsoleAppender;
pub use list::{EventList, ListAppender};

// Re-export the trait so appender authors need a single import
pub use crate::core::Appender;
