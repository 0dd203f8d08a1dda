//! The coverage loop.
//!
//! Baseline first (insertion analysis plus one measurement run), then up to
//! `max_iterations` rounds of generate, validate one by one, re-measure.
//! Stops early once the desired coverage is reached.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::source_context::relative_path;
use super::test_generator::UnitTestGenerator;
use super::test_validator::{UnitTestValidator, ValidatorSettings};
use crate::domain::errors::{AgentError, AgentResult};
use crate::domain::models::{
    CommandAdaptationRequest, FailureReason, FinalReport, LanguageMap, RunConfig, RunTarget,
};
use crate::domain::ports::{AgentCompletion, NoopObserver, RunEvent, RunObserver};
use crate::infrastructure::process::ProcessRunner;

/// Drives one run over one source file and its test file.
pub struct CoverAgent {
    completion: Arc<dyn AgentCompletion>,
    config: RunConfig,
    target: RunTarget,
    languages: LanguageMap,
    model: String,
    observer: Arc<dyn RunObserver>,
}

impl CoverAgent {
    /// Agent with default languages and no observer.
    pub fn new(
        completion: Arc<dyn AgentCompletion>,
        config: RunConfig,
        target: RunTarget,
        model: impl Into<String>,
    ) -> Self {
        Self {
            completion,
            config,
            target,
            languages: LanguageMap::default(),
            model: model.into(),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Replace the extension to language map.
    #[must_use]
    pub fn with_languages(mut self, languages: LanguageMap) -> Self {
        self.languages = languages;
        self
    }

    /// Report progress to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run the loop to completion.
    ///
    /// # Errors
    /// Missing input files, a broken baseline build, a missing coverage
    /// report, or unresolved insertion lines end the run.
    #[instrument(skip(self), fields(source = %self.target.source_file.display()))]
    pub async fn run(mut self) -> AgentResult<FinalReport> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        info!(%run_id, model = %self.model, "Starting coverage run");

        self.prepare_files()?;
        let language = self.languages.language_of(&self.target.source_file);

        let mut input_tokens = 0;
        let mut output_tokens = 0;
        if self.config.run_each_test_separately {
            let (input, output) = self.adapt_test_command().await;
            input_tokens += input;
            output_tokens += output;
        }

        let mut generator = UnitTestGenerator::new(
            self.completion.clone(),
            &self.target,
            language.clone(),
            self.config.max_tests_per_run,
        )?;
        let mut validator = UnitTestValidator::new(
            self.completion.clone(),
            ProcessRunner::from_secs(self.config.command_timeout_secs),
            self.target.clone(),
            language,
            ValidatorSettings::from_run_config(&self.config),
        );

        validator.initial_test_suite_analysis().await?;
        let initial_coverage = validator.run_coverage().await?;
        self.observer.on_event(&RunEvent::BaselineMeasured {
            coverage: initial_coverage,
        });

        let mut accepted_tests = 0;
        let mut rejected_tests: BTreeMap<FailureReason, usize> = BTreeMap::new();
        let mut iterations = 0;
        let mut target_reached = false;

        while iterations < self.config.max_iterations {
            iterations += 1;
            self.observer.on_event(&RunEvent::IterationStarted {
                iteration: iterations,
                max_iterations: self.config.max_iterations,
            });

            let batch = generator
                .generate_tests(
                    validator.failed_runs(),
                    validator.testing_framework(),
                    validator.coverage_report(),
                )
                .await
                .map_err(|err| err.with_rollback_failures(validator.rollback_failures()))?;
            self.observer.on_event(&RunEvent::CandidatesGenerated {
                iteration: iterations,
                count: batch.candidates.len(),
            });
            if batch.candidates.is_empty() {
                warn!(iteration = iterations, "No candidates generated");
            }

            for (index, candidate) in batch.candidates.into_iter().enumerate() {
                let outcome = validator.validate_test(candidate).await;
                match outcome.reason {
                    None => accepted_tests += 1,
                    Some(reason) => *rejected_tests.entry(reason).or_default() += 1,
                }
                self.observer
                    .on_event(&RunEvent::CandidateValidated { index, outcome: &outcome });
            }

            let coverage = validator.run_coverage().await.map_err(|err| {
                AgentError::from(err).with_rollback_failures(validator.rollback_failures())
            })?;
            self.observer.on_event(&RunEvent::CoverageMeasured {
                iteration: iterations,
                coverage,
            });

            if coverage * 100.0 >= self.config.desired_coverage {
                info!(iteration = iterations, "Desired coverage reached");
                target_reached = true;
                break;
            }
            info!(
                coverage = %format!("{:.2}%", coverage * 100.0),
                target = %format!("{:.2}%", self.config.desired_coverage),
                "Coverage still below target"
            );
        }

        input_tokens += generator.input_tokens() + validator.input_tokens();
        output_tokens += generator.output_tokens() + validator.output_tokens();

        let report = FinalReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            model: self.model.clone(),
            test_file: self.target.test_file.clone(),
            iterations,
            initial_coverage,
            final_coverage: validator.current_coverage(),
            desired_coverage: self.config.desired_coverage,
            target_reached,
            accepted_tests,
            rejected_tests,
            input_tokens,
            output_tokens,
            rollback_failures: validator.rollback_failures().to_vec(),
        };

        info!(
            iterations,
            target_reached,
            final_coverage = %format!("{:.2}%", report.final_coverage * 100.0),
            input_tokens,
            output_tokens,
            "Coverage run finished"
        );
        Ok(report)
    }

    /// Check inputs and switch to the output copy of the test file if asked.
    fn prepare_files(&mut self) -> AgentResult<()> {
        if !self.target.source_file.is_file() {
            return Err(AgentError::SourceFileNotFound(self.target.source_file.clone()));
        }
        if !self.target.test_file.is_file() {
            return Err(AgentError::TestFileNotFound(self.target.test_file.clone()));
        }
        if !self.target.project_root.is_dir() {
            warn!(
                "Project root {} does not exist",
                self.target.project_root.display()
            );
        }

        if let Some(output) = self.target.test_file_output.clone() {
            if output != self.target.test_file {
                std::fs::copy(&self.target.test_file, &output).map_err(|source| {
                    AgentError::TestFileCopy {
                        path: output.clone(),
                        source,
                    }
                })?;
                info!("Working on a copy of the test file: {}", output.display());
            }
            self.target.test_file = output;
        }
        Ok(())
    }

    /// Narrow the test command to the test file; keeps the original command
    /// when the model cannot help. Returns the tokens spent.
    async fn adapt_test_command(&mut self) -> (u64, u64) {
        let Ok(relative) = self.target.test_file.strip_prefix(&self.target.project_root) else {
            warn!("Test file is outside the project root; running the full test command");
            return (0, 0);
        };

        let request = CommandAdaptationRequest {
            test_file_relative_path: relative.display().to_string(),
            test_command: self.target.test_command.clone(),
            project_root_dir: self.target.project_root.display().to_string(),
        };
        let result = self.completion.adapt_test_command(&request).await;

        if result.is_error() {
            warn!(
                "Keeping the original test command for {}: {}",
                relative_path(&self.target.test_file, &self.target.project_root),
                result.content
            );
        } else {
            info!(command = %result.content, "Using single-test command");
            self.target.test_command = result.content;
        }
        (result.input_tokens, result.output_tokens)
    }
}
