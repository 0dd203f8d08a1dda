//! Coverage report parsing
//!
//! - `jacoco`: JaCoCo XML reports, per-line covered/missed classification
//! - `identifier`: source file to report entry resolution strategies

pub mod identifier;
pub mod jacoco;

pub use identifier::{identifier_for_language, FileNameIdentifier, JavaLikeIdentifier};
pub use jacoco::{parse_jacoco_report, CoverageProcessor};
