//! File extension to language tag lookup

use std::collections::BTreeMap;
use std::path::Path;

const DEFAULT_LANGUAGES: &[(&str, &str)] = &[
    ("java", "java"),
    ("kt", "kotlin"),
    ("kts", "kotlin"),
    ("scala", "scala"),
    ("groovy", "groovy"),
    ("py", "python"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("go", "go"),
    ("rs", "rust"),
    ("cs", "csharp"),
    ("cpp", "cpp"),
    ("cc", "cpp"),
    ("hpp", "cpp"),
    ("c", "c"),
    ("h", "c"),
    ("rb", "ruby"),
    ("php", "php"),
    ("swift", "swift"),
];

/// Tag for extensions no entry maps.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Maps file extensions to language tags.
#[derive(Debug, Clone)]
pub struct LanguageMap {
    by_extension: BTreeMap<String, String>,
}

impl Default for LanguageMap {
    fn default() -> Self {
        Self {
            by_extension: DEFAULT_LANGUAGES
                .iter()
                .map(|(ext, lang)| ((*ext).to_string(), (*lang).to_string()))
                .collect(),
        }
    }
}

impl LanguageMap {
    /// Defaults plus `overrides`, which win on conflicts.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut map = Self::default();
        for (ext, lang) in overrides {
            map.by_extension.insert(
                ext.trim_start_matches('.').to_ascii_lowercase(),
                lang.to_ascii_lowercase(),
            );
        }
        map
    }

    /// Language tag of `path` by extension, case-insensitive.
    pub fn language_of(&self, path: &Path) -> String {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.by_extension.get(&ext.to_ascii_lowercase()))
            .cloned()
            .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string())
    }
}
