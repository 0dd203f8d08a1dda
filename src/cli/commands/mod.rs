//! Subcommand implementations

pub mod run;
