//! Run summary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

use super::validation::FailureReason;

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalReport {
    /// Identifier of this run, logged when it starts.
    pub run_id: Uuid,
    /// Wall-clock start.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end.
    pub finished_at: DateTime<Utc>,
    /// Model name as configured.
    pub model: String,
    /// Live test file, after any output copy.
    pub test_file: PathBuf,
    /// Iterations started.
    pub iterations: u32,
    /// Fractions in `[0, 1]`.
    pub initial_coverage: f64,
    /// Coverage after the last measurement.
    pub final_coverage: f64,
    /// Percent, as configured.
    pub desired_coverage: f64,
    /// Whether `final_coverage` met `desired_coverage`.
    pub target_reached: bool,
    /// Candidates kept in the test file.
    pub accepted_tests: usize,
    /// Rejected candidates per reason.
    pub rejected_tests: BTreeMap<FailureReason, usize>,
    /// Prompt tokens across every model call.
    pub input_tokens: u64,
    /// Completion tokens across every model call.
    pub output_tokens: u64,
    /// Rollbacks that could not restore the test file.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rollback_failures: Vec<String>,
}

impl FinalReport {
    /// Rejected candidates over all reasons.
    pub fn rejected_total(&self) -> usize {
        self.rejected_tests.values().sum()
    }

    /// `false` when a rollback failed and the test file content is unknown.
    pub fn test_file_consistent(&self) -> bool {
        self.rollback_failures.is_empty()
    }
}
