//! Logging infrastructure
//!
//! Structured logging to stderr using tracing and tracing-subscriber, with
//! an optional rolling JSON log file.

pub mod logger;

pub use logger::LoggerImpl;
