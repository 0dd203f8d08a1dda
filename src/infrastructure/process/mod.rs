//! External command execution with a wall-clock ceiling

pub mod runner;

pub use runner::ProcessRunner;
