//! Splicing a candidate test into test file text.
//!
//! Pure text manipulation. The validator owns reading, writing and
//! rolling back the file itself.

use std::collections::HashSet;
use thiserror::Error;

use crate::domain::models::GeneratedTest;

/// Test file text with one candidate applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// Full test file text after the splice
    pub content: String,
    /// Novel import lines spliced in
    pub imports_inserted: usize,
    /// Lines of test code spliced in
    pub test_lines_inserted: usize,
}

impl Patch {
    /// How far the test insertion line moves once this patch is kept.
    pub const fn lines_added(&self) -> usize {
        self.imports_inserted + self.test_lines_inserted
    }
}

/// Why a candidate could not be spliced in.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatchError {
    /// The candidate's test code is blank.
    #[error("Generated test has no code")]
    EmptyTest,

    /// An insertion line lies beyond the file.
    #[error("Insertion line {line} is past the end of the test file ({len} lines)")]
    OutOfRange {
        /// Requested insertion line.
        line: usize,
        /// Lines in the test file.
        len: usize,
    },
}

/// Drop trailing whitespace and leading blank lines, keeping the
/// indentation of the first code line.
pub fn trim_test_code(code: &str) -> &str {
    let code = code.trim_end();
    let mut start = 0;
    for line in code.split_inclusive('\n') {
        if !line.trim().is_empty() {
            break;
        }
        start += line.len();
    }
    &code[start..]
}

/// Trimmed import block with one level of surrounding quotes removed.
/// A literal `""` means no imports.
pub fn normalize_imports(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed
    }
}

/// Import lines not already present in `existing` (compared trimmed).
pub fn novel_import_lines<'a>(imports: &'a str, existing: &str) -> Vec<&'a str> {
    let mut seen: HashSet<&str> = existing.lines().map(str::trim).collect();
    imports
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && seen.insert(line))
        .collect()
}

/// Apply `test` to `current`.
///
/// Imports go after line `imports_after` (when given and there is anything
/// new to add). Test code goes after line `tests_after`, shifted down by
/// the imports just added. Line numbers refer to `current`.
pub fn build_patch(
    current: &str,
    test: &GeneratedTest,
    tests_after: usize,
    imports_after: Option<usize>,
) -> Result<Patch, PatchError> {
    let code = trim_test_code(&test.test_code);
    if code.is_empty() {
        return Err(PatchError::EmptyTest);
    }

    let mut lines: Vec<&str> = current.split('\n').collect();
    // A trailing newline leaves an empty last element that must stay last.
    let len = if current.is_empty() || current.ends_with('\n') {
        lines.len() - 1
    } else {
        lines.len()
    };
    if tests_after > len {
        return Err(PatchError::OutOfRange {
            line: tests_after,
            len,
        });
    }

    let novel = novel_import_lines(normalize_imports(&test.new_imports_code), current);
    let imports_inserted = match imports_after {
        Some(line) if !novel.is_empty() => {
            if line > len {
                return Err(PatchError::OutOfRange { line, len });
            }
            let count = novel.len();
            lines.splice(line..line, novel);
            count
        }
        _ => 0,
    };

    let at = tests_after + imports_inserted;
    let code_lines: Vec<&str> = code.split('\n').collect();
    let test_lines_inserted = code_lines.len();
    lines.splice(at..at, code_lines);

    Ok(Patch {
        content: lines.join("\n"),
        imports_inserted,
        test_lines_inserted,
    })
}
