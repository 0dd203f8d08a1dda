//! Candidate validation against the live test file.
//!
//! The validator is the only writer of the test file. Each candidate is
//! patched in, run, and then either kept as the new baseline or rolled
//! back to the exact pre-patch content. See [`UnitTestValidator::validate_test`].

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, instrument, warn};

use super::patch::{build_patch, Patch};
use super::source_context::{number_lines, relative_path};
use crate::domain::errors::ValidatorError;
use crate::domain::models::{
    CommandResult, FailedTestRun, FailureAnalysisRequest, FailureReason, GeneratedTest,
    InsertLineRequest, RunConfig, RunTarget, ValidationOutcome,
};
use crate::domain::ports::AgentCompletion;
use crate::infrastructure::coverage::CoverageProcessor;
use crate::infrastructure::llm::structured::{line_number, parse_structured, text_field};
use crate::infrastructure::process::ProcessRunner;

/// Analysis text recorded for candidates that passed without adding coverage.
pub const NO_COVERAGE_GAIN_MESSAGE: &str = "Test did not increase code coverage";

const UNKNOWN_FRAMEWORK: &str = "Unknown";

/// Validation knobs taken from the run configuration.
#[derive(Debug, Clone)]
pub struct ValidatorSettings {
    /// Test command runs per candidate; stops at the first failure
    pub num_attempts: u32,
    /// Ask the model to explain failing candidate runs
    pub analyze_failures: bool,
    /// Model calls allowed for locating the insertion lines
    pub insert_line_attempts: u32,
}

impl ValidatorSettings {
    /// Settings from the `run` config section, with counts floored at 1.
    pub fn from_run_config(config: &RunConfig) -> Self {
        Self {
            num_attempts: config.run_tests_multiple_times.max(1),
            analyze_failures: config.analyze_failures,
            insert_line_attempts: config.insert_line_attempts.max(1),
        }
    }
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self::from_run_config(&RunConfig::default())
    }
}

/// Everything the validator learns and mutates during a run.
#[derive(Debug, Clone, Default)]
pub struct ValidatorState {
    /// Line after which the next test goes, relative to the current file
    pub tests_insert_after: Option<usize>,
    /// Line after which new imports go
    pub imports_insert_after: Option<usize>,
    /// Framework named by the insertion analysis
    pub testing_framework: String,
    /// Fraction in `[0, 1]`
    pub current_coverage: f64,
    /// Coverage of the source file after the last measurement
    pub per_file_coverage: BTreeMap<PathBuf, f64>,
    /// Coverage context for the next generation prompt
    pub coverage_report: String,
    /// Rejected candidates, fed back into generation
    pub failed_runs: Vec<FailedTestRun>,
    /// Restores that could not be written
    pub rollback_failures: Vec<String>,
    /// Prompt tokens spent by validator model calls
    pub input_tokens: u64,
    /// Completion tokens spent by validator model calls
    pub output_tokens: u64,
}

/// Patches candidates into the test file, runs them, and keeps or rolls back each one.
///
/// Holds the only mutable view of the test file for the whole run.
pub struct UnitTestValidator {
    completion: Arc<dyn AgentCompletion>,
    runner: ProcessRunner,
    coverage: CoverageProcessor,
    target: RunTarget,
    language: String,
    settings: ValidatorSettings,
    state: ValidatorState,
}

impl UnitTestValidator {
    /// Validator for `target`; call [`Self::initial_test_suite_analysis`] before validating.
    pub fn new(
        completion: Arc<dyn AgentCompletion>,
        runner: ProcessRunner,
        target: RunTarget,
        language: impl Into<String>,
        settings: ValidatorSettings,
    ) -> Self {
        let language = language.into();
        Self {
            completion,
            runner,
            coverage: CoverageProcessor::for_language(&language),
            target,
            language,
            settings,
            state: ValidatorState::default(),
        }
    }

    /// Current state, for reporting and tests.
    pub const fn state(&self) -> &ValidatorState {
        &self.state
    }

    /// Coverage after the last measurement or accepted candidate.
    pub const fn current_coverage(&self) -> f64 {
        self.state.current_coverage
    }

    /// Testing framework named by the insertion analysis.
    pub fn testing_framework(&self) -> &str {
        &self.state.testing_framework
    }

    /// Coverage context for the next generation prompt.
    pub fn coverage_report(&self) -> &str {
        &self.state.coverage_report
    }

    /// Rejected candidates so far.
    pub fn failed_runs(&self) -> &[FailedTestRun] {
        &self.state.failed_runs
    }

    /// Restores that failed; non-empty means the test file may hold a rejected candidate.
    pub fn rollback_failures(&self) -> &[String] {
        &self.state.rollback_failures
    }

    /// Prompt tokens spent so far.
    pub const fn input_tokens(&self) -> u64 {
        self.state.input_tokens
    }

    /// Completion tokens spent so far.
    pub const fn output_tokens(&self) -> u64 {
        self.state.output_tokens
    }

    fn test_file(&self) -> &Path {
        &self.target.test_file
    }

    // ---------------------------------------------------------------------
    // Baseline
    // ---------------------------------------------------------------------

    /// Ask the model where tests and imports go in the existing test file.
    ///
    /// Retried while either line number is missing from the answer.
    #[instrument(skip(self), fields(test_file = %self.target.test_file.display()))]
    pub async fn initial_test_suite_analysis(&mut self) -> Result<(), ValidatorError> {
        let attempts = self.settings.insert_line_attempts;
        let content = read_file(self.test_file())?;
        let request = InsertLineRequest {
            language: self.language.clone(),
            test_file_numbered: number_lines(&content),
            test_file_name: relative_path(self.test_file(), &self.target.project_root),
        };

        for attempt in 1..=attempts {
            let result = self.completion.analyze_test_insert_line(&request).await;
            self.add_tokens(result.input_tokens, result.output_tokens);

            if result.is_error() {
                warn!(attempt, "Insert line analysis failed: {}", result.content);
                continue;
            }
            let Ok(value) = parse_structured(&result.content) else {
                warn!(attempt, "Insert line analysis returned unparseable text");
                continue;
            };

            let tests_after = line_number(&value, "relevant_line_number_to_insert_tests_after");
            let imports_after = line_number(&value, "relevant_line_number_to_insert_imports_after");
            if let (Some(tests_after), Some(imports_after)) = (tests_after, imports_after) {
                self.state.tests_insert_after = Some(tests_after);
                self.state.imports_insert_after = Some(imports_after);
                self.state.testing_framework = text_field(&value, "testing_framework")
                    .unwrap_or_else(|| UNKNOWN_FRAMEWORK.to_string());
                info!(
                    tests_after,
                    imports_after,
                    framework = %self.state.testing_framework,
                    "Test suite analyzed"
                );
                return Ok(());
            }
            warn!(attempt, "Insert line analysis is missing a line number");
        }

        Err(ValidatorError::InsertionAnalysisFailed { attempts })
    }

    /// Measurement run: execute the test command and refresh the baseline.
    ///
    /// A failing command is fatal. An unreadable report degrades to using its
    /// raw text as coverage context; a missing one is fatal.
    #[instrument(skip(self))]
    pub async fn run_coverage(&mut self) -> Result<f64, ValidatorError> {
        let result = self
            .runner
            .run(&self.target.test_command, &self.target.test_command_dir)
            .await;
        if !result.succeeded() {
            return Err(ValidatorError::BuildFatal {
                command: self.target.test_command.clone(),
                exit_code: result.exit_code,
                stdout: result.stdout,
                stderr: result.stderr,
            });
        }

        match self
            .coverage
            .process(&self.target.report_path, &self.target.source_file, result.started_at)
        {
            Ok(data) => {
                self.state.current_coverage = data.coverage_percentage;
                self.state
                    .per_file_coverage
                    .insert(self.target.source_file.clone(), data.coverage_percentage);
                self.state.coverage_report = data.summary();
            }
            Err(err) if err.is_fatal() => return Err(err.into()),
            Err(err) => {
                warn!("Using raw coverage report text: {}", err);
                self.state.coverage_report = std::fs::read_to_string(&self.target.report_path)
                    .unwrap_or_else(|_| err.to_string());
            }
        }

        info!(
            coverage = %format!("{:.2}%", self.state.current_coverage * 100.0),
            "Coverage measured"
        );
        Ok(self.state.current_coverage)
    }

    // ---------------------------------------------------------------------
    // Candidates
    // ---------------------------------------------------------------------

    /// Patch in one candidate, run it, and keep it only if the tests pass
    /// and coverage strictly increases.
    ///
    /// On any rejection the test file is restored to its previous content.
    #[instrument(skip_all)]
    pub async fn validate_test(&mut self, test: GeneratedTest) -> ValidationOutcome {
        let Some(tests_after) = self.state.tests_insert_after else {
            warn!("No insertion line known, skipping candidate");
            return ValidationOutcome::fail(test, FailureReason::InvalidInsertionPoint);
        };

        let original = match read_file(self.test_file()) {
            Ok(original) => original,
            Err(err) => return self.runtime_error(test, &err),
        };

        let patch = match build_patch(&original, &test, tests_after, self.state.imports_insert_after) {
            Ok(patch) => patch,
            Err(err) => {
                warn!("Rejecting candidate: {}", err);
                return ValidationOutcome::fail(test, FailureReason::InvalidInsertionPoint);
            }
        };

        match self.try_candidate(&original, &patch, &test).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.rollback(&original);
                self.runtime_error(test, &err)
            }
        }
    }

    async fn try_candidate(
        &mut self,
        original: &str,
        patch: &Patch,
        test: &GeneratedTest,
    ) -> Result<ValidationOutcome, ValidatorError> {
        write_atomic(self.test_file(), &patch.content)?;
        debug!(
            imports = patch.imports_inserted,
            lines = patch.test_lines_inserted,
            "Candidate written"
        );

        let result = self.run_attempts().await;

        if !result.succeeded() {
            self.rollback(original);
            info!(exit_code = result.exit_code, "Candidate failed, rolled back");
            let analysis = if self.settings.analyze_failures {
                self.analyze_failure(&patch.content, &result).await
            } else {
                None
            };
            self.state.failed_runs.push(FailedTestRun {
                test: test.clone(),
                error_message: analysis.clone(),
            });
            return Ok(ValidationOutcome::fail(test.clone(), FailureReason::TestFailed)
                .with_output(result.exit_code, result.stdout, result.stderr)
                .with_analysis(analysis));
        }

        let data = self
            .coverage
            .process(&self.target.report_path, &self.target.source_file, result.started_at)?;

        if data.coverage_percentage <= self.state.current_coverage {
            self.rollback(original);
            info!(
                coverage = %format!("{:.2}%", data.coverage_percentage * 100.0),
                "Candidate did not increase coverage, rolled back"
            );
            self.state.failed_runs.push(FailedTestRun {
                test: test.clone(),
                error_message: Some(NO_COVERAGE_GAIN_MESSAGE.to_string()),
            });
            return Ok(ValidationOutcome::fail(test.clone(), FailureReason::NoCoverageGain)
                .with_output(result.exit_code, result.stdout, result.stderr)
                .with_analysis(Some(NO_COVERAGE_GAIN_MESSAGE.to_string())));
        }

        let tests_after = self.state.tests_insert_after.unwrap_or(0) + patch.lines_added();
        self.state.tests_insert_after = Some(tests_after);
        info!(
            from = %format!("{:.2}%", self.state.current_coverage * 100.0),
            to = %format!("{:.2}%", data.coverage_percentage * 100.0),
            tests_after,
            "Candidate accepted"
        );
        self.state.current_coverage = data.coverage_percentage;
        self.state
            .per_file_coverage
            .insert(self.target.source_file.clone(), data.coverage_percentage);
        self.state.coverage_report = data.summary();

        Ok(ValidationOutcome::pass(
            test.clone(),
            result.exit_code,
            result.stdout,
            result.stderr,
        ))
    }

    /// Run the test command up to `num_attempts` times, stopping at the
    /// first failure.
    async fn run_attempts(&self) -> CommandResult {
        let command = &self.target.test_command;
        let dir = &self.target.test_command_dir;
        let mut result = self.runner.run(command, dir).await;
        for attempt in 2..=self.settings.num_attempts {
            if !result.succeeded() {
                break;
            }
            debug!(attempt, "Repeating test run");
            result = self.runner.run(command, dir).await;
        }
        result
    }

    async fn analyze_failure(&mut self, processed_test_file: &str, result: &CommandResult) -> Option<String> {
        let source_file = match std::fs::read_to_string(&self.target.source_file) {
            Ok(source) => source,
            Err(err) => {
                warn!("Skipping failure analysis: {}", err);
                return None;
            }
        };
        let request = FailureAnalysisRequest {
            source_file_name: relative_path(&self.target.source_file, &self.target.project_root),
            source_file,
            processed_test_file: processed_test_file.to_string(),
            stdout: result.stdout.clone(),
            stderr: result.stderr.clone(),
            test_file_name: relative_path(self.test_file(), &self.target.project_root),
        };

        let analysis = self.completion.analyze_test_failure(&request).await;
        self.add_tokens(analysis.input_tokens, analysis.output_tokens);
        if analysis.is_error() {
            warn!("Failure analysis unavailable: {}", analysis.content);
            return None;
        }
        Some(analysis.content.trim().to_string())
    }

    fn runtime_error(&mut self, test: GeneratedTest, err: &ValidatorError) -> ValidationOutcome {
        warn!("Candidate hit a runtime error: {}", err);
        let message = err.to_string();
        self.state.failed_runs.push(FailedTestRun {
            test: test.clone(),
            error_message: Some(message.clone()),
        });
        ValidationOutcome::fail(test, FailureReason::RuntimeError).with_analysis(Some(message))
    }

    /// Best effort; a failed restore is recorded and surfaced in the report.
    fn rollback(&mut self, original: &str) {
        if let Err(err) = write_atomic(self.test_file(), original) {
            error!("Could not restore test file: {}", err);
            self.state
                .rollback_failures
                .push(format!("{}: {err}", self.test_file().display()));
        }
    }

    fn add_tokens(&mut self, input: u64, output: u64) {
        self.state.input_tokens += input;
        self.state.output_tokens += output;
    }
}

fn read_file(path: &Path) -> Result<String, ValidatorError> {
    std::fs::read_to_string(path).map_err(|source| ValidatorError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Replace `path` with `content` through a temp file in the same directory.
fn write_atomic(path: &Path, content: &str) -> Result<(), ValidatorError> {
    let io_err = |source| ValidatorError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir).map_err(io_err)?;
    file.write_all(content.as_bytes()).map_err(io_err)?;
    if let Ok(metadata) = std::fs::metadata(path) {
        file.as_file()
            .set_permissions(metadata.permissions())
            .map_err(io_err)?;
    }
    file.as_file().sync_all().map_err(io_err)?;
    file.persist(path).map_err(|err| io_err(err.error))?;
    Ok(())
}
