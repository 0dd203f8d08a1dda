//! Candidate test generation.

use serde_yaml::Value;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::source_context::{included_files_block, number_lines, relative_path};
use crate::domain::errors::{AgentError, AgentResult};
use crate::domain::models::{FailedTestRun, GeneratedTest, RunTarget, TestGenerationRequest};
use crate::domain::ports::AgentCompletion;
use crate::infrastructure::llm::structured::parse_structured;

/// Candidates parsed from one generation call.
#[derive(Debug, Clone, Default)]
pub struct GeneratedBatch {
    /// Parsed candidates, at most `max_tests`
    pub candidates: Vec<GeneratedTest>,
    /// Model answer as received
    pub raw_response: String,
}

/// Asks the model for new tests of one source file.
pub struct UnitTestGenerator {
    completion: Arc<dyn AgentCompletion>,
    source_file: PathBuf,
    test_file: PathBuf,
    project_root: PathBuf,
    language: String,
    max_tests: usize,
    additional_instructions: String,
    included_files: String,
    input_tokens: u64,
    output_tokens: u64,
}

impl UnitTestGenerator {
    /// Reads the included files once; a missing one fails here.
    pub fn new(
        completion: Arc<dyn AgentCompletion>,
        target: &RunTarget,
        language: impl Into<String>,
        max_tests: usize,
    ) -> AgentResult<Self> {
        Ok(Self {
            completion,
            source_file: target.source_file.clone(),
            test_file: target.test_file.clone(),
            project_root: target.project_root.clone(),
            language: language.into(),
            max_tests,
            additional_instructions: target.additional_instructions.clone(),
            included_files: included_files_block(&target.included_files)?,
            input_tokens: 0,
            output_tokens: 0,
        })
    }

    /// Prompt tokens spent by generation calls.
    pub const fn input_tokens(&self) -> u64 {
        self.input_tokens
    }

    /// Completion tokens spent by generation calls.
    pub const fn output_tokens(&self) -> u64 {
        self.output_tokens
    }

    /// Request up to `max_tests` candidates.
    ///
    /// An unparseable answer yields an empty batch. Only reading the source
    /// or test file can fail.
    pub async fn generate_tests(
        &mut self,
        failed_runs: &[FailedTestRun],
        testing_framework: &str,
        coverage_report: &str,
    ) -> AgentResult<GeneratedBatch> {
        let source = read(&self.source_file)?;
        let test_file = read(&self.test_file)?;

        let request = TestGenerationRequest {
            source_file_name: relative_path(&self.source_file, &self.project_root),
            max_tests: self.max_tests,
            source_file_numbered: number_lines(&source),
            code_coverage_report: coverage_report.to_string(),
            language: self.language.clone(),
            test_file,
            test_file_name: relative_path(&self.test_file, &self.project_root),
            testing_framework: testing_framework.to_string(),
            additional_instructions_text: self.additional_instructions.clone(),
            additional_includes_section: self.included_files.clone(),
            failed_tests_section: failed_tests_section(failed_runs),
        };

        let result = self.completion.generate_tests(&request).await;
        self.input_tokens += result.input_tokens;
        self.output_tokens += result.output_tokens;

        if result.is_error() {
            warn!("Test generation failed: {}", result.content);
            return Ok(GeneratedBatch {
                candidates: Vec::new(),
                raw_response: result.content,
            });
        }

        let mut candidates = parse_candidates(&result.content);
        candidates.truncate(self.max_tests);
        info!(count = candidates.len(), "Generated candidate tests");

        Ok(GeneratedBatch {
            candidates,
            raw_response: result.content,
        })
    }
}

fn read(path: &Path) -> AgentResult<String> {
    std::fs::read_to_string(path).map_err(|source| AgentError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Earlier rejected candidates, each with its failure analysis when known.
pub fn failed_tests_section(failed_runs: &[FailedTestRun]) -> String {
    let mut section = String::new();
    for run in failed_runs {
        let body = serde_json::to_string_pretty(&run.test).unwrap_or_else(|_| run.test.test_code.clone());
        let _ = write!(section, "Failed Test:\n```\n{body}\n```\n");
        match &run.error_message {
            Some(message) => {
                let _ = write!(section, "Test execution error analysis:\n{message}\n\n\n");
            }
            None => section.push_str("\n\n"),
        }
    }
    section
}

/// Entries under `new_tests`; malformed ones are dropped.
pub fn parse_candidates(response: &str) -> Vec<GeneratedTest> {
    let value = match parse_structured(response) {
        Ok(value) => value,
        Err(err) => {
            warn!("Could not parse generated tests: {}", err);
            return Vec::new();
        }
    };

    let Some(Value::Sequence(entries)) = value.get("new_tests") else {
        warn!("Generation response has no new_tests list");
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match serde_yaml::from_value::<GeneratedTest>(entry.clone()) {
            Ok(test) => Some(test),
            Err(err) => {
                debug!("Dropping malformed candidate: {}", err);
                None
            }
        })
        .collect()
}
