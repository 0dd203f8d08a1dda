//! Human-readable output for the CLI.

pub mod report;
