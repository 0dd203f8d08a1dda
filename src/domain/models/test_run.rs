//! Candidates and command runs

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// One model-proposed unit test and the imports it needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedTest {
    /// Test method source, indented as it should appear in the file.
    #[serde(alias = "testCode")]
    pub test_code: String,
    /// Import lines the test needs, possibly empty.
    #[serde(default, alias = "newImportsCode")]
    pub new_imports_code: String,
}

impl GeneratedTest {
    /// Candidate from its code and imports.
    pub fn new(test_code: impl Into<String>, new_imports_code: impl Into<String>) -> Self {
        Self {
            test_code: test_code.into(),
            new_imports_code: new_imports_code.into(),
        }
    }
}

/// A rejected candidate and why it was rejected.
///
/// Fed back into later generation prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTestRun {
    /// The rejected candidate.
    pub test: GeneratedTest,
    /// Failure analysis or error text, when one was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Output of one external command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr, or the spawn/timeout reason.
    pub stderr: String,
    /// `-1` when the process timed out, failed to start, or died by signal.
    pub exit_code: i32,
    /// Instant just before the process was spawned.
    pub started_at: SystemTime,
    /// Whether the wall-clock ceiling killed the process.
    pub timed_out: bool,
}

impl CommandResult {
    /// Exit code zero.
    pub const fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}
