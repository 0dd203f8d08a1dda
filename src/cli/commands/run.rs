//! `cover-agent run`

use anyhow::{Context, Result};
use clap::Args;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::output::report::{render_report, ProgressObserver};
use crate::domain::models::{Config, LanguageMap, RunTarget};
use crate::domain::ports::{ChunkObserver, NoopObserver, RunObserver};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::llm::{ModelClientConfig, OpenRouterClient, RetryPolicy};
use crate::infrastructure::logging::LoggerImpl;
use crate::infrastructure::templates::TemplateRenderer;
use crate::services::{CoverAgent, DefaultAgentCompletion};

/// Arguments of `cover-agent run`
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Source file whose coverage should increase
    #[arg(long)]
    pub source_file_path: PathBuf,

    /// Existing test file that receives the new tests
    #[arg(long)]
    pub test_file_path: PathBuf,

    /// Write tests to a copy of the test file at this path instead
    #[arg(long)]
    pub test_file_output_path: Option<PathBuf>,

    /// JaCoCo XML report written by the test command
    #[arg(long)]
    pub code_coverage_report_path: PathBuf,

    /// Command that runs the tests and writes the coverage report
    #[arg(long)]
    pub test_command: String,

    /// Working directory of the test command
    #[arg(long, default_value = ".")]
    pub test_command_dir: PathBuf,

    /// Project root; paths shown to the model are relative to it
    #[arg(long, default_value = ".")]
    pub project_root: PathBuf,

    /// Extra files given to the model as context (repeatable)
    #[arg(long)]
    pub included_files: Vec<PathBuf>,

    /// Free-text instructions appended to the generation prompt
    #[arg(long, default_value = "")]
    pub additional_instructions: String,

    /// Model identifier, e.g. openai/gpt-4o
    #[arg(long)]
    pub model: Option<String>,

    /// Target line coverage in percent
    #[arg(long)]
    pub desired_coverage: Option<f64>,

    /// Maximum number of generate/validate iterations
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Maximum candidates requested per iteration
    #[arg(long)]
    pub max_tests: Option<usize>,

    /// Run each candidate's tests this many times
    #[arg(long)]
    pub run_tests_multiple_times: Option<u32>,

    /// Test command timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Adapt the test command to run only the test file
    #[arg(long)]
    pub run_each_test_separately: bool,

    /// Skip the model call that explains failing candidates
    #[arg(long)]
    pub no_failure_analysis: bool,

    /// YAML file overriding built-in prompt templates
    #[arg(long)]
    pub prompts_file: Option<PathBuf>,

    /// Do not echo streamed model output
    #[arg(long)]
    pub quiet_stream: bool,
}

impl RunArgs {
    /// Apply command line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.model.name.clone_from(model);
        }
        if let Some(desired) = self.desired_coverage {
            config.run.desired_coverage = desired;
        }
        if let Some(max_iterations) = self.max_iterations {
            config.run.max_iterations = max_iterations;
        }
        if let Some(max_tests) = self.max_tests {
            config.run.max_tests_per_run = max_tests;
        }
        if let Some(times) = self.run_tests_multiple_times {
            config.run.run_tests_multiple_times = times;
        }
        if let Some(timeout) = self.timeout {
            config.run.command_timeout_secs = timeout;
        }
        if self.run_each_test_separately {
            config.run.run_each_test_separately = true;
        }
        if self.no_failure_analysis {
            config.run.analyze_failures = false;
        }
        if self.prompts_file.is_some() {
            config.prompts_file.clone_from(&self.prompts_file);
        }
    }

    /// Files and commands named on the command line
    pub fn target(&self) -> RunTarget {
        RunTarget {
            source_file: self.source_file_path.clone(),
            test_file: self.test_file_path.clone(),
            test_file_output: self.test_file_output_path.clone(),
            report_path: self.code_coverage_report_path.clone(),
            test_command: self.test_command.clone(),
            test_command_dir: self.test_command_dir.clone(),
            project_root: self.project_root.clone(),
            included_files: self.included_files.clone(),
            additional_instructions: self.additional_instructions.clone(),
        }
    }
}

/// Load config, build the client and loop, run it and print the report
pub async fn execute(args: RunArgs, config_path: Option<PathBuf>, json: bool) -> Result<()> {
    let mut config = ConfigLoader::load(config_path.as_deref())?;
    args.apply_overrides(&mut config);
    ConfigLoader::validate(&config)?;

    let _logger = LoggerImpl::init(&config.logging)?;

    let api_key = config.model.api_key.clone().context(
        "No API key configured: set model.api_key, COVER_AGENT_MODEL__API_KEY or OPENROUTER_API_KEY",
    )?;

    let renderer = match &config.prompts_file {
        Some(path) => TemplateRenderer::with_overrides(path),
        None => TemplateRenderer::builtin(),
    }
    .context("Failed to load prompt templates")?;

    let mut client = OpenRouterClient::new(
        ModelClientConfig::from_config(&config.model, api_key),
        RetryPolicy::from_config(&config.retry),
    )
    .context("Failed to create model client")?;
    if !json && !args.quiet_stream {
        client = client.with_chunk_observer(stdout_echo());
    }

    let completion = Arc::new(DefaultAgentCompletion::new(
        Arc::new(client),
        Arc::new(renderer),
    ));

    let observer: Arc<dyn RunObserver> = if json {
        Arc::new(NoopObserver)
    } else {
        Arc::new(ProgressObserver::new(config.run.desired_coverage))
    };

    let report = CoverAgent::new(
        completion,
        config.run.clone(),
        args.target(),
        config.model.name.clone(),
    )
    .with_languages(LanguageMap::with_overrides(&config.languages))
    .with_observer(observer)
    .run()
    .await
    .context("Coverage run failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render_report(&report));
    }

    if !report.target_reached {
        anyhow::bail!(
            "Desired coverage of {:.2}% not reached after {} iteration(s) (final {:.2}%)",
            report.desired_coverage,
            report.iterations,
            report.final_coverage * 100.0
        );
    }
    Ok(())
}

/// Echo streamed model output to stdout as it arrives.
fn stdout_echo() -> ChunkObserver {
    Arc::new(|chunk: &str| {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(chunk.as_bytes());
        let _ = stdout.flush();
    })
}
