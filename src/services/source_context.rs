//! Text renderings of project files used in prompts.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::domain::errors::{AgentError, AgentResult};

/// Prefix every line with its 1-based number and a space.
pub fn number_lines(text: &str) -> String {
    text.split('\n')
        .enumerate()
        .map(|(i, line)| format!("{} {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Concatenate included files, each preceded by its path.
pub fn included_files_block(paths: &[PathBuf]) -> AgentResult<String> {
    let mut block = String::new();
    for path in paths {
        let content = std::fs::read_to_string(path).map_err(|source| AgentError::Io {
            path: path.clone(),
            source,
        })?;
        let _ = write!(
            block,
            "file_path: `{}`\ncontent:\n```\n{}\n```\n",
            path.display(),
            content
        );
    }
    Ok(block.trim().to_string())
}

/// `path` relative to `root`, or `path` unchanged when it lies outside it.
pub fn relative_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
