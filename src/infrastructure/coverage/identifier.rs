//! Report entry resolution strategies

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::domain::ports::{ReportEntry, ReportIdentifier};

/// `package com.example.util;`
static PACKAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*package\s+([\w.]+)\s*;.*$").expect("PACKAGE_RE regex should compile")
});

/// `public class Calculator ...`, optionally with modifiers before `class`.
static PUBLIC_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*public\s+(?:(?:final|abstract|static|sealed)\s+)*(?:class|interface|enum|record)\s+(\w+)")
        .expect("PUBLIC_TYPE_RE regex should compile")
});

/// Resolves Java-like sources by their package and public type declarations.
///
/// Falls back to the source file name when no public type is declared.
#[derive(Debug, Default, Clone, Copy)]
pub struct JavaLikeIdentifier;

impl ReportIdentifier for JavaLikeIdentifier {
    fn identify(&self, source_path: &Path, source_text: &str) -> Option<ReportEntry> {
        let mut package = None;
        let mut type_name = None;

        for line in source_text.lines() {
            if package.is_none() {
                package = PACKAGE_RE.captures(line).map(|caps| caps[1].to_string());
            }
            if type_name.is_none() {
                type_name = PUBLIC_TYPE_RE.captures(line).map(|caps| caps[1].to_string());
            }
            if package.is_some() && type_name.is_some() {
                break;
            }
        }

        let file_name = match (type_name, source_path.extension().and_then(|e| e.to_str())) {
            (Some(name), Some(ext)) => format!("{name}.{ext}"),
            _ => source_path.file_name()?.to_str()?.to_string(),
        };

        Some(ReportEntry {
            file_name,
            package: package.map(|p| p.replace('.', "/")),
        })
    }
}

/// Resolves a source to the report entry named after its file.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileNameIdentifier;

impl ReportIdentifier for FileNameIdentifier {
    fn identify(&self, source_path: &Path, _source_text: &str) -> Option<ReportEntry> {
        Some(ReportEntry {
            file_name: source_path.file_name()?.to_str()?.to_string(),
            package: None,
        })
    }
}

/// Strategy used for a language tag.
pub fn identifier_for_language(language: &str) -> Box<dyn ReportIdentifier> {
    match language {
        "java" | "groovy" => Box::new(JavaLikeIdentifier),
        _ => Box::new(FileNameIdentifier),
    }
}
