//! JaCoCo XML report parsing

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, instrument, warn};

use super::identifier::identifier_for_language;
use crate::domain::errors::CoverageError;
use crate::domain::models::CoverageData;
use crate::domain::ports::{ReportEntry, ReportIdentifier};

/// Reads JaCoCo XML reports for one source file.
pub struct CoverageProcessor {
    identifier: Box<dyn ReportIdentifier>,
}

impl CoverageProcessor {
    /// Processor resolving entries with `identifier`.
    pub fn new(identifier: Box<dyn ReportIdentifier>) -> Self {
        Self { identifier }
    }

    /// Processor with the identifier suited to `language`.
    pub fn for_language(language: &str) -> Self {
        Self::new(identifier_for_language(language))
    }

    /// Coverage of `source_path` according to the report at `report_path`.
    ///
    /// A missing report is an error. A report not modified after `since` is
    /// only logged. No matching entry yields empty, zero coverage.
    #[instrument(skip(self, since), fields(report = %report_path.display()))]
    pub fn process(
        &self,
        report_path: &Path,
        source_path: &Path,
        since: SystemTime,
    ) -> Result<CoverageData, CoverageError> {
        verify_report_update(report_path, since)?;

        let source_text = std::fs::read_to_string(source_path).map_err(|source| CoverageError::Io {
            path: source_path.to_path_buf(),
            source,
        })?;
        let Some(entry) = self.identifier.identify(source_path, &source_text) else {
            warn!("Could not derive a report entry for {}", source_path.display());
            return Ok(CoverageData::default());
        };

        let xml = std::fs::read_to_string(report_path).map_err(|source| CoverageError::Io {
            path: report_path.to_path_buf(),
            source,
        })?;

        match parse_jacoco_report(&xml, &entry) {
            Ok(Some(data)) => {
                debug!(
                    entry = %entry.file_name,
                    covered = data.covered_lines.len(),
                    missed = data.missed_lines.len(),
                    "Parsed coverage"
                );
                Ok(data)
            }
            Ok(None) => {
                warn!(
                    "No coverage entry named {} in {}",
                    entry.file_name,
                    report_path.display()
                );
                Ok(CoverageData::default())
            }
            Err(message) => Err(CoverageError::Malformed {
                path: report_path.to_path_buf(),
                message,
            }),
        }
    }
}

fn verify_report_update(report_path: &Path, since: SystemTime) -> Result<(), CoverageError> {
    let metadata = match std::fs::metadata(report_path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(CoverageError::ReportMissing(report_path.to_path_buf()));
        }
        Err(source) => {
            return Err(CoverageError::Io {
                path: report_path.to_path_buf(),
                source,
            })
        }
    };

    match metadata.modified() {
        Ok(modified) if modified <= since => {
            warn!(
                "Coverage report {} was not updated after the test command started",
                report_path.display()
            );
        }
        Ok(_) => {}
        Err(err) => debug!("Report modification time unavailable: {}", err),
    }
    Ok(())
}

/// Line sets of the `sourcefile` element matching `entry`.
///
/// When `entry` has a package, a match inside that report package wins over
/// a same-named file elsewhere. `Ok(None)` means no element matched.
pub fn parse_jacoco_report(xml: &str, entry: &ReportEntry) -> Result<Option<CoverageData>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut current_package: Option<String> = None;
    let mut in_match = false;
    let mut covered = BTreeSet::new();
    let mut missed = BTreeSet::new();
    let mut name_only_match: Option<CoverageData> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| format!("at byte {}: {err}", reader.buffer_position()))?;
        match event {
            Event::Start(e) => match e.name().as_ref() {
                b"package" => current_package = attribute(&e, b"name")?,
                b"sourcefile" => {
                    in_match = attribute(&e, b"name")?.as_deref() == Some(entry.file_name.as_str());
                    covered.clear();
                    missed.clear();
                }
                b"line" if in_match => record_line(&e, &mut covered, &mut missed)?,
                _ => {}
            },
            Event::Empty(e) if in_match && e.name().as_ref() == b"line" => {
                record_line(&e, &mut covered, &mut missed)?;
            }
            Event::End(e) => match e.name().as_ref() {
                b"sourcefile" if in_match => {
                    in_match = false;
                    let data = CoverageData::new(std::mem::take(&mut covered), std::mem::take(&mut missed));
                    let package_matches = match &entry.package {
                        None => true,
                        Some(package) => current_package.as_deref() == Some(package.as_str()),
                    };
                    if package_matches {
                        return Ok(Some(data));
                    }
                    if name_only_match.is_none() {
                        name_only_match = Some(data);
                    }
                }
                b"package" => current_package = None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(name_only_match)
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, String> {
    for attr in element.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        if attr.key.as_ref() == key {
            let value = attr.unescape_value().map_err(|err| err.to_string())?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn record_line(
    element: &BytesStart<'_>,
    covered: &mut BTreeSet<u32>,
    missed: &mut BTreeSet<u32>,
) -> Result<(), String> {
    let number = attribute(element, b"nr")?.and_then(|nr| nr.trim().parse::<u32>().ok());
    let missed_instructions = attribute(element, b"mi")?.and_then(|mi| mi.trim().parse::<u64>().ok());

    match (number, missed_instructions) {
        (Some(nr), Some(0)) => {
            covered.insert(nr);
        }
        (Some(nr), Some(_)) => {
            missed.insert(nr);
        }
        _ => debug!("Skipping line element without nr/mi"),
    }
    Ok(())
}
