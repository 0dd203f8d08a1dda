//! Structured (YAML) model response bodies.
//!
//! Models answer with a YAML mapping, usually fenced as ```` ```yaml ````.
//! Lookups are lenient: line numbers may arrive as integers or strings.

use serde_yaml::Value;
use tracing::debug;

/// Most trailing lines dropped while looking for a parseable prefix.
const MAX_TRIMMED_LINES: usize = 40;

/// The YAML text inside the first fence, or the whole trimmed body.
pub fn extract_yaml_block(text: &str) -> &str {
    let trimmed = text.trim();
    let body = match trimmed.find("```yaml") {
        Some(start) => &trimmed[start + "```yaml".len()..],
        None => trimmed.strip_prefix("```").unwrap_or(trimmed),
    };
    match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    }
}

/// Parse a model response into a YAML value.
///
/// Truncated responses are common, so when the full block does not parse,
/// trailing lines are dropped until a mapping parses.
pub fn parse_structured(text: &str) -> Result<Value, serde_yaml::Error> {
    let block = extract_yaml_block(text);
    let first_error = match serde_yaml::from_str::<Value>(block) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    let lines: Vec<&str> = block.lines().collect();
    for dropped in 1..=MAX_TRIMMED_LINES.min(lines.len().saturating_sub(1)) {
        let candidate = lines[..lines.len() - dropped].join("\n");
        if let Ok(value @ Value::Mapping(_)) = serde_yaml::from_str::<Value>(&candidate) {
            debug!(dropped, "Parsed structured response after dropping trailing lines");
            return Ok(value);
        }
    }

    Err(first_error)
}

/// A line number under `key`, given as an integer or a numeric string.
pub fn line_number(value: &Value, key: &str) -> Option<usize> {
    match value.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A non-empty scalar under `key`, as trimmed text.
pub fn text_field(value: &Value, key: &str) -> Option<String> {
    let text = match value.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_fenced_block() {
        let text = "Here you go:\n```yaml\nlanguage: java\n```\ntrailing words";
        assert_eq!(extract_yaml_block(text).trim(), "language: java");
    }

    #[test]
    fn test_unfenced_body_is_used_whole() {
        assert_eq!(extract_yaml_block("  a: 1\n"), "a: 1");
    }

    #[test]
    fn test_line_numbers_from_int_or_string() {
        let value = parse_structured(
            "```yaml\nrelevant_line_number_to_insert_tests_after: 42\nrelevant_line_number_to_insert_imports_after: \"3\"\n```",
        )
        .unwrap();

        assert_eq!(line_number(&value, "relevant_line_number_to_insert_tests_after"), Some(42));
        assert_eq!(line_number(&value, "relevant_line_number_to_insert_imports_after"), Some(3));
        assert_eq!(line_number(&value, "missing"), None);
    }

    #[test]
    fn test_truncated_response_keeps_complete_prefix() {
        let text = "```yaml\ntesting_framework: JUnit5\nnew_command_line: |\n  mvn test\nbroken: [unclosed\n";
        let value = parse_structured(text).unwrap();
        assert_eq!(text_field(&value, "testing_framework").as_deref(), Some("JUnit5"));
        assert_eq!(text_field(&value, "new_command_line").as_deref(), Some("mvn test"));
    }

    #[test]
    fn test_garbage_fails() {
        assert!(parse_structured("key: [unclosed").is_err());
    }

    #[test]
    fn test_blank_text_field_is_absent() {
        let value = parse_structured("testing_framework: \"  \"").unwrap();
        assert_eq!(text_field(&value, "testing_framework"), None);
    }
}
