//! What one run works on

use std::path::PathBuf;

/// Files and commands a run operates on.
#[derive(Debug, Clone, Default)]
pub struct RunTarget {
    /// Source file whose coverage is raised
    pub source_file: PathBuf,
    /// Existing test file that receives candidates
    pub test_file: PathBuf,
    /// Optional copy of the test file that becomes the live test file
    pub test_file_output: Option<PathBuf>,
    /// Coverage report written by the test command
    pub report_path: PathBuf,
    /// Shell command that runs the tests and writes the report
    pub test_command: String,
    /// Working directory of the test command
    pub test_command_dir: PathBuf,
    /// Root that model-facing paths are relative to
    pub project_root: PathBuf,
    /// Extra context files for the generation prompt
    pub included_files: Vec<PathBuf>,
    /// Free text appended to the generation prompt
    pub additional_instructions: String,
}
