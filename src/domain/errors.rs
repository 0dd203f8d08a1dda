//! Domain errors for the coverage loop.
//!
//! Only failures that invalidate the baseline travel as errors. A rejected
//! candidate is an ordinary [`ValidationOutcome`](super::models::ValidationOutcome).

use std::path::PathBuf;
use thiserror::Error;

/// Boxed cause carried by [`ModelCallError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A model call that still failed once its retry budget was spent.
#[derive(Debug, Error)]
#[error("Model call failed after {attempts} attempt(s): {source}")]
pub struct ModelCallError {
    /// Number of attempts made, including the first.
    pub attempts: u32,
    /// The error from the last attempt.
    #[source]
    pub source: BoxError,
}

impl ModelCallError {
    /// Wrap the last attempt's error.
    pub fn new(attempts: u32, source: impl Into<BoxError>) -> Self {
        Self {
            attempts,
            source: source.into(),
        }
    }
}

/// Errors raised while reading a coverage report.
#[derive(Debug, Error)]
pub enum CoverageError {
    /// The test command left no report at the configured path.
    #[error("Coverage report not found: {0}")]
    ReportMissing(PathBuf),

    /// The report exists but could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Report path.
        path: PathBuf,
        /// Underlying read error.
        #[source]
        source: std::io::Error,
    },

    /// The report is not the XML shape the processor expects.
    #[error("Malformed coverage report {path}: {message}")]
    Malformed {
        /// Report path.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
}

impl CoverageError {
    /// Missing reports abort the run; anything else degrades to raw report text.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ReportMissing(_))
    }
}

/// Errors raised by the test validator outside of per-candidate validation.
#[derive(Debug, Error)]
pub enum ValidatorError {
    /// The unmodified suite failed while measuring coverage.
    #[error("Test command failed during a coverage measurement run (exit code {exit_code}): {stderr}")]
    BuildFatal {
        /// Command as run.
        command: String,
        /// Exit code, `-1` on timeout or spawn failure.
        exit_code: i32,
        /// Captured stdout.
        stdout: String,
        /// Captured stderr.
        stderr: String,
    },

    /// The model never named both insertion lines.
    #[error("Could not determine test insertion lines after {attempts} attempt(s)")]
    InsertionAnalysisFailed {
        /// Model calls made.
        attempts: u32,
    },

    /// The coverage report could not be used.
    #[error(transparent)]
    Coverage(#[from] CoverageError),

    /// Reading or writing a project file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors that terminate a whole run.
#[derive(Debug, Error)]
pub enum AgentError {
    /// `--source-file-path` does not exist.
    #[error("Source file not found: {0}")]
    SourceFileNotFound(PathBuf),

    /// `--test-file-path` does not exist.
    #[error("Test file not found: {0}")]
    TestFileNotFound(PathBuf),

    /// Copying the test file to `--test-file-output-path` failed.
    #[error("Failed to copy test file to {path}: {source}")]
    TestFileCopy {
        /// Destination path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An input file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Baseline analysis or a coverage measurement failed.
    #[error(transparent)]
    Validator(#[from] ValidatorError),

    /// The run ended on `source` after some rejected candidates could not
    /// be removed again, so the test file may still contain them.
    #[error("{source} (test file not restored after {} rejected candidate(s): {})", .rollback_failures.len(), .rollback_failures.join("; "))]
    RollbackIncomplete {
        /// What ended the run.
        #[source]
        source: Box<AgentError>,
        /// One entry per failed restore.
        rollback_failures: Vec<String>,
    },
}

impl AgentError {
    /// Attach restores that failed earlier in the run, if there were any.
    pub fn with_rollback_failures(self, rollback_failures: &[String]) -> Self {
        if rollback_failures.is_empty() {
            return self;
        }
        Self::RollbackIncomplete {
            source: Box::new(self),
            rollback_failures: rollback_failures.to_vec(),
        }
    }

    /// Failed restores carried by this error.
    pub fn rollback_failures(&self) -> &[String] {
        match self {
            Self::RollbackIncomplete {
                rollback_failures, ..
            } => rollback_failures,
            _ => &[],
        }
    }
}

/// Result alias for whole-run operations.
pub type AgentResult<T> = Result<T, AgentError>;
