//! Shared fixtures for integration tests
//!
//! A `Project` is a throwaway Java-shaped project whose test command is a
//! shell script. The script fails when the test file contains `FAILING` and
//! otherwise writes a JaCoCo report in which source line `N` counts as
//! covered once the test file mentions `covers_line_N`. Line 3 is always
//! covered, so the baseline is 25%.
//!
//! Two more markers break the project on purpose: `NO_REPORT` passes while
//! deleting the report, and `DELETES_SUITE` removes the whole test directory
//! and fails. A missing test file fails every later run.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

use cover_agent::domain::models::{
    CommandAdaptationRequest, CompletionResult, FailureAnalysisRequest, GeneratedTest,
    InsertLineRequest, ModelResponse, RunTarget, TestGenerationRequest,
};
use cover_agent::domain::ports::AgentCompletion;

pub const SOURCE: &str = "package com.example;

public class Calc {
    public int add(int a, int b) { return a + b; }
    public int sub(int a, int b) { return a - b; }
    public int mul(int a, int b) { return a * b; }
}
";

pub const TEST_FILE: &str = "import org.junit.Test;

public class CalcTest {
    @Test
    public void covers_line_3() {}
}
";

const RUN_TESTS: &str = r#"#!/bin/sh
test_file="$1"
report="$2"
if [ ! -f "$test_file" ]; then
  echo "no such test file: $test_file" >&2
  exit 1
fi
if grep -q DELETES_SUITE "$test_file"; then
  rm -rf "$(dirname "$test_file")"
  exit 1
fi
if grep -q NO_REPORT "$test_file"; then
  rm -f "$report"
  exit 0
fi
if grep -q FAILING "$test_file"; then
  echo "CalcTest > FAILING FAILED"
  echo "expected:<3> but was:<4>" >&2
  exit 1
fi
mkdir -p "$(dirname "$report")"
{
  echo '<?xml version="1.0" encoding="UTF-8"?>'
  echo '<report name="fixture"><package name="com/example"><sourcefile name="Calc.java">'
  for nr in 3 4 5 6; do
    if [ "$nr" = 3 ] || grep -q "covers_line_$nr" "$test_file"; then mi=0; else mi=2; fi
    echo "<line nr=\"$nr\" mi=\"$mi\" ci=\"1\" mb=\"0\" cb=\"0\"/>"
  done
  echo '</sourcefile></package></report>'
} > "$report"
"#;

/// Tests go after line 5 (the last test method), imports after line 1.
pub const INSERT_LINES_REPLY: &str = "```yaml
language: java
testing_framework: JUnit4
number_of_tests: 1
relevant_line_number_to_insert_tests_after: 5
relevant_line_number_to_insert_imports_after: 1
```";

/// Tokens reported by every scripted call.
pub const CALL_INPUT_TOKENS: u64 = 10;
pub const CALL_OUTPUT_TOKENS: u64 = 5;

pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("test")).unwrap();
        std::fs::write(root.join("src/Calc.java"), SOURCE).unwrap();
        std::fs::write(root.join("test/CalcTest.java"), TEST_FILE).unwrap();
        std::fs::write(root.join("run_tests.sh"), RUN_TESTS).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn test_file(&self) -> PathBuf {
        self.root().join("test/CalcTest.java")
    }

    pub fn read_test_file(&self) -> String {
        std::fs::read_to_string(self.test_file()).unwrap()
    }

    pub fn report_path(&self) -> PathBuf {
        self.root().join("target/jacoco.xml")
    }

    /// Test command that runs the tests in `test_file` (relative to the root).
    pub fn command_for(test_file: &str) -> String {
        format!("sh run_tests.sh {test_file} target/jacoco.xml")
    }

    pub fn target(&self) -> RunTarget {
        RunTarget {
            source_file: self.root().join("src/Calc.java"),
            test_file: self.test_file(),
            test_file_output: None,
            report_path: self.report_path(),
            test_command: Self::command_for("test/CalcTest.java"),
            test_command_dir: self.root().to_path_buf(),
            project_root: self.root().to_path_buf(),
            included_files: Vec::new(),
            additional_instructions: String::new(),
        }
    }
}

/// A test method named after the source line it covers.
pub fn covering(line: u32, imports: &str) -> GeneratedTest {
    GeneratedTest::new(
        format!("    @Test\n    public void covers_line_{line}() {{}}"),
        imports,
    )
}

/// A test method the fixture's test command always fails on.
pub fn failing() -> GeneratedTest {
    GeneratedTest::new("    @Test\n    public void FAILING() {}", "")
}

/// A passing test method after which the fixture leaves no coverage report.
pub fn without_report() -> GeneratedTest {
    GeneratedTest::new("    @Test\n    public void NO_REPORT() {}", "")
}

/// A failing test method that takes the fixture's test directory with it.
pub fn deleting_suite() -> GeneratedTest {
    GeneratedTest::new("    @Test\n    public void DELETES_SUITE() {}", "")
}

/// Generation answer in the fenced YAML shape the prompts ask for.
pub fn generation_reply(tests: &[GeneratedTest]) -> String {
    let body = serde_yaml::to_string(&serde_json::json!({ "new_tests": tests })).unwrap();
    format!("```yaml\n{body}```")
}

/// `AgentCompletion` fake answering from per-operation queues.
///
/// Generation falls back to an empty batch and insert-line analysis to
/// [`INSERT_LINES_REPLY`] once their queues run dry.
#[derive(Default)]
pub struct ScriptedCompletion {
    generations: Mutex<VecDeque<String>>,
    insert_lines: Mutex<VecDeque<String>>,
    analysis: Option<String>,
    adapted_command: Option<String>,
    pub generation_requests: Mutex<Vec<TestGenerationRequest>>,
    pub analysis_requests: Mutex<Vec<FailureAnalysisRequest>>,
    pub adaptation_requests: Mutex<Vec<CommandAdaptationRequest>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generation(self, reply: impl Into<String>) -> Self {
        self.generations.lock().unwrap().push_back(reply.into());
        self
    }

    pub fn with_insert_lines(self, reply: impl Into<String>) -> Self {
        self.insert_lines.lock().unwrap().push_back(reply.into());
        self
    }

    pub fn with_analysis(mut self, analysis: impl Into<String>) -> Self {
        self.analysis = Some(analysis.into());
        self
    }

    pub fn with_adapted_command(mut self, reply: impl Into<String>) -> Self {
        self.adapted_command = Some(reply.into());
        self
    }

    fn reply(content: String) -> CompletionResult {
        let response = ModelResponse {
            text: content,
            prompt_tokens: CALL_INPUT_TOKENS,
            completion_tokens: CALL_OUTPUT_TOKENS,
        };
        CompletionResult::new(response.text.clone(), &response, None)
    }
}

#[async_trait]
impl AgentCompletion for ScriptedCompletion {
    async fn generate_tests(&self, request: &TestGenerationRequest) -> CompletionResult {
        self.generation_requests.lock().unwrap().push(request.clone());
        let reply = self
            .generations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| generation_reply(&[]));
        Self::reply(reply)
    }

    async fn analyze_test_failure(&self, request: &FailureAnalysisRequest) -> CompletionResult {
        self.analysis_requests.lock().unwrap().push(request.clone());
        match &self.analysis {
            Some(analysis) => Self::reply(analysis.clone()),
            None => CompletionResult::error("analysis unavailable", CALL_INPUT_TOKENS, 0, None),
        }
    }

    async fn analyze_test_insert_line(&self, _request: &InsertLineRequest) -> CompletionResult {
        let reply = self
            .insert_lines
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| INSERT_LINES_REPLY.to_string());
        Self::reply(reply)
    }

    async fn adapt_test_command(&self, request: &CommandAdaptationRequest) -> CompletionResult {
        self.adaptation_requests.lock().unwrap().push(request.clone());
        match &self.adapted_command {
            Some(command) => Self::reply(command.clone()),
            None => CompletionResult::error("Could not parse command", CALL_INPUT_TOKENS, 0, None),
        }
    }
}
