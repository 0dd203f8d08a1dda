//! Source file to coverage report entry

use std::path::Path;

/// Coverage report entry a source file corresponds to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    /// Value of the entry's `name` attribute, e.g. `Calculator.java`
    pub file_name: String,
    /// Report package path, e.g. `com/example`, when the source declares one
    pub package: Option<String>,
}

/// Derives the report entry for a source file.
pub trait ReportIdentifier: Send + Sync {
    /// `None` when the source gives no usable file name.
    fn identify(&self, source_path: &Path, source_text: &str) -> Option<ReportEntry>;
}
