//! Per-candidate verdicts

use serde::{Deserialize, Serialize};
use std::fmt;

use super::test_run::GeneratedTest;

/// Pass/fail verdict for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationStatus {
    /// Candidate kept.
    Pass,
    /// Candidate rolled back.
    Fail,
}

/// Why a candidate was rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    /// The test command exited non-zero.
    TestFailed,
    /// Tests passed but coverage did not strictly increase.
    NoCoverageGain,
    /// Writing, running or measuring the candidate hit an error.
    RuntimeError,
    /// No usable insertion line, or an empty candidate.
    InvalidInsertionPoint,
}

impl FailureReason {
    /// Kebab-case name used in reports.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TestFailed => "test-failed",
            Self::NoCoverageGain => "no-coverage-gain",
            Self::RuntimeError => "runtime-error",
            Self::InvalidInsertionPoint => "invalid-insertion-point",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of validating one candidate against the live test file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// Verdict.
    pub status: ValidationStatus,
    /// Set for every `Fail`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    /// `None` when the test command never ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Test command stdout from the last run.
    #[serde(default)]
    pub stdout: String,
    /// Test command stderr from the last run.
    #[serde(default)]
    pub stderr: String,
    /// The candidate.
    pub test: GeneratedTest,
    /// Failure analysis or error text for rejected candidates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
}

impl ValidationOutcome {
    /// Accepted candidate with the output of its last run.
    pub fn pass(test: GeneratedTest, exit_code: i32, stdout: String, stderr: String) -> Self {
        Self {
            status: ValidationStatus::Pass,
            reason: None,
            exit_code: Some(exit_code),
            stdout,
            stderr,
            test,
            analysis: None,
        }
    }

    /// Rejected candidate without command output.
    pub fn fail(test: GeneratedTest, reason: FailureReason) -> Self {
        Self {
            status: ValidationStatus::Fail,
            reason: Some(reason),
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            test,
            analysis: None,
        }
    }

    /// Attach command output.
    #[must_use]
    pub fn with_output(mut self, exit_code: i32, stdout: String, stderr: String) -> Self {
        self.exit_code = Some(exit_code);
        self.stdout = stdout;
        self.stderr = stderr;
        self
    }

    /// Attach failure analysis or error text.
    #[must_use]
    pub fn with_analysis(mut self, analysis: Option<String>) -> Self {
        self.analysis = analysis;
        self
    }

    /// Whether the candidate was kept.
    pub fn is_pass(&self) -> bool {
        self.status == ValidationStatus::Pass
    }
}
