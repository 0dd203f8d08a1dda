//! Per-file line coverage

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Covered and missed line numbers for one compilation unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageData {
    /// 1-based source lines executed at least once.
    pub covered_lines: BTreeSet<u32>,
    /// 1-based source lines never executed.
    pub missed_lines: BTreeSet<u32>,
    /// Fraction in `[0, 1]`.
    pub coverage_percentage: f64,
}

impl CoverageData {
    /// Derives the percentage from the two sets; empty sets count as 0%.
    pub fn new(covered_lines: BTreeSet<u32>, missed_lines: BTreeSet<u32>) -> Self {
        let total = covered_lines.len() + missed_lines.len();
        let coverage_percentage = if total == 0 {
            0.0
        } else {
            covered_lines.len() as f64 / total as f64
        };
        Self {
            covered_lines,
            missed_lines,
            coverage_percentage,
        }
    }

    /// Text fed to the generation prompt as the coverage report.
    pub fn summary(&self) -> String {
        let missed = self
            .missed_lines
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Lines covered: {}\nLines missed: {}\nPercentage covered: {:.2}%\nMissed line numbers: [{}]",
            self.covered_lines.len(),
            self.missed_lines.len(),
            self.coverage_percentage * 100.0,
            missed
        )
    }
}
