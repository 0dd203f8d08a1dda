//! Final report table and live progress lines.
//!
//! Progress goes to stderr so stdout only carries streamed model output and
//! the report itself.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use console::style;
use std::env;

use crate::domain::models::{FinalReport, ValidationStatus};
use crate::domain::ports::{RunEvent, RunObserver};

/// Render a finished run as a two-column table.
pub fn render_report(report: &FinalReport) -> String {
    let use_colors = supports_color();
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Run").add_attribute(Attribute::Bold),
            Cell::new(report.run_id.to_string()).add_attribute(Attribute::Bold),
        ]);

    let result = if report.target_reached {
        colored(Cell::new("target reached"), Color::Green, use_colors)
    } else {
        colored(Cell::new("target not reached"), Color::Red, use_colors)
    };

    let duration = (report.finished_at - report.started_at).num_seconds();
    let rows = [
        ("Model", Cell::new(&report.model)),
        ("Test file", Cell::new(report.test_file.display())),
        ("Iterations", Cell::new(report.iterations)),
        ("Initial coverage", Cell::new(percent(report.initial_coverage))),
        ("Final coverage", Cell::new(percent(report.final_coverage))),
        ("Desired coverage", Cell::new(format!("{:.2}%", report.desired_coverage))),
        ("Result", result),
        ("Accepted tests", Cell::new(report.accepted_tests)),
        ("Rejected tests", Cell::new(rejections(report))),
        (
            "Tokens (in / out)",
            Cell::new(format!("{} / {}", report.input_tokens, report.output_tokens)),
        ),
        ("Duration", Cell::new(format!("{duration}s"))),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), value]);
    }

    let mut out = table.to_string();
    if !report.test_file_consistent() {
        out.push_str("\n\nWARNING: the test file could not be restored and may contain a rejected test:");
        for failure in &report.rollback_failures {
            out.push_str("\n  ");
            out.push_str(failure);
        }
    }
    out
}

fn rejections(report: &FinalReport) -> String {
    if report.rejected_tests.is_empty() {
        return "0".to_string();
    }
    let detail: Vec<String> = report
        .rejected_tests
        .iter()
        .map(|(reason, count)| format!("{reason}: {count}"))
        .collect();
    format!("{} ({})", report.rejected_total(), detail.join(", "))
}

fn percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

fn colored(cell: Cell, color: Color, use_colors: bool) -> Cell {
    if use_colors {
        cell.fg(color)
    } else {
        cell
    }
}

fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

/// Prints run progress to stderr.
pub struct ProgressObserver {
    desired_coverage: f64,
}

impl ProgressObserver {
    /// Observer comparing progress against `desired_coverage` percent
    pub const fn new(desired_coverage: f64) -> Self {
        Self { desired_coverage }
    }
}

impl RunObserver for ProgressObserver {
    fn on_event(&self, event: &RunEvent<'_>) {
        match event {
            RunEvent::BaselineMeasured { coverage } => {
                eprintln!(
                    "Initial coverage: {} (target {:.2}%)",
                    style(percent(*coverage)).bold(),
                    self.desired_coverage
                );
            }
            RunEvent::IterationStarted {
                iteration,
                max_iterations,
            } => {
                eprintln!(
                    "\n{}",
                    style(format!("--- Iteration {iteration}/{max_iterations} ---")).cyan().bold()
                );
            }
            RunEvent::CandidatesGenerated { count, .. } => {
                eprintln!("\nGenerated {count} candidate test(s)");
            }
            RunEvent::CandidateValidated { index, outcome } => {
                let status = match outcome.status {
                    ValidationStatus::Pass => style("PASS").green().bold(),
                    ValidationStatus::Fail => style("FAIL").red().bold(),
                };
                match outcome.reason {
                    Some(reason) => eprintln!("  candidate {}: {status} ({reason})", index + 1),
                    None => eprintln!("  candidate {}: {status}", index + 1),
                }
            }
            RunEvent::CoverageMeasured { iteration, coverage } => {
                let line = format!("Coverage after iteration {iteration}: {}", percent(*coverage));
                if *coverage * 100.0 >= self.desired_coverage {
                    eprintln!("{}", style(line).green());
                } else {
                    eprintln!("{line}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::FailureReason;
    use chrono::{Duration, Utc};
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn report() -> FinalReport {
        let started_at = Utc::now();
        FinalReport {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: started_at + Duration::seconds(42),
            model: "openai/gpt-4o".to_string(),
            test_file: PathBuf::from("src/test/java/CalcTest.java"),
            iterations: 2,
            initial_coverage: 0.4,
            final_coverage: 0.85,
            desired_coverage: 80.0,
            target_reached: true,
            accepted_tests: 3,
            rejected_tests: BTreeMap::from([
                (FailureReason::TestFailed, 2),
                (FailureReason::NoCoverageGain, 1),
            ]),
            input_tokens: 1200,
            output_tokens: 340,
            rollback_failures: Vec::new(),
        }
    }

    #[test]
    fn test_report_lists_key_figures() {
        let out = temp_env::with_var("NO_COLOR", Some("1"), || render_report(&report()));

        assert!(out.contains("40.00%"));
        assert!(out.contains("85.00%"));
        assert!(out.contains("80.00%"));
        assert!(out.contains("target reached"));
        assert!(out.contains("3 (test-failed: 2, no-coverage-gain: 1)"));
        assert!(out.contains("1200 / 340"));
        assert!(out.contains("42s"));
        assert!(!out.contains("WARNING"));
    }

    #[test]
    fn test_report_warns_about_rollback_failures() {
        let mut report = report();
        report.rollback_failures.push("CalcTest.java: permission denied".to_string());

        let out = render_report(&report);
        assert!(out.contains("WARNING"));
        assert!(out.contains("CalcTest.java: permission denied"));
    }
}
