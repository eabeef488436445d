// src/testgen/parse.rs
//
// Model replies arrive as free text that should contain a JSON array of
// test-case records. Fences and prose around the array are tolerated;
// individual bad records are dropped, not fatal.

use regex::Regex;
use serde_json::Value;

use crate::error::{Error, Result};

/// A record as returned by the model, before an id is assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCase {
    pub description: String,
    pub steps: String,
    pub expected_result: String,
    pub priority: String,
}

#[derive(Debug)]
pub struct ParsedBatch {
    pub records: Vec<ParsedCase>,
    pub dropped: usize,
}

const REQUIRED_FIELDS: [&str; 4] = ["description", "steps", "expected_result", "priority"];

/// Parse one batch reply. Fails when no JSON array can be located or when
/// every record inside it is invalid.
pub fn parse_batch(text: &str) -> Result<ParsedBatch> {
    let stripped = strip_code_fences(text);
    let json = extract_json_array(&stripped)
        .ok_or_else(|| Error::model("no JSON array found in model reply"))?;
    let items: Vec<Value> = serde_json::from_str(json)
        .map_err(|e| Error::model(format!("model reply is not a valid JSON array: {e}")))?;

    let mut records = Vec::new();
    let mut dropped = 0;
    for item in &items {
        match parse_record(item) {
            Some(rec) => records.push(rec),
            None => dropped += 1,
        }
    }

    if records.is_empty() {
        return Err(Error::model(format!(
            "no valid records in model reply ({} dropped)",
            dropped
        )));
    }
    Ok(ParsedBatch { records, dropped })
}

fn parse_record(item: &Value) -> Option<ParsedCase> {
    for field in REQUIRED_FIELDS {
        item.get(field)?.as_str()?;
    }
    let get = |field: &str| item[field].as_str().unwrap_or_default().trim().to_string();
    Some(ParsedCase {
        description: get("description"),
        steps: get("steps"),
        expected_result: get("expected_result"),
        priority: title_case(&get("priority")),
    })
}

/// Drop a leading ```lang line and a trailing ``` line when present.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let mut body = trimmed;
    if body.starts_with("```") {
        body = match body.find('\n') {
            Some(nl) => &body[nl + 1..],
            None => "",
        };
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
    }
    body.trim().to_string()
}

/// Substring from the first `[` to the last `]`, inclusive.
pub fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// First run of digits anywhere in the text.
pub fn first_integer(text: &str) -> Option<u64> {
    let re = Regex::new(r"\d+").ok()?;
    re.find(text)?.as_str().parse().ok()
}

/// "high" -> "High", "MEDIUM" -> "Medium".
pub fn title_case(s: &str) -> String {
    let mut chars = s.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_REPLY: &str = r#"```json
[
  {"description": "d1", "steps": "s1", "expected_result": "e1", "priority": "high"},
  {"description": "d2", "steps": "s2", "expected_result": "e2", "priority": "Medium"}
]
```"#;

    #[test]
    fn parses_fenced_array() {
        let batch = parse_batch(GOOD_REPLY).unwrap();
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.dropped, 0);
        assert_eq!(batch.records[0].priority, "High");
        assert_eq!(batch.records[1].description, "d2");
    }

    #[test]
    fn drops_records_missing_fields() {
        let reply = r#"Here you go:
[
  {"description": "ok", "steps": "s", "expected_result": "e", "priority": "Low"},
  {"description": "no steps", "expected_result": "e", "priority": "Low"},
  {"steps": "s", "expected_result": "e", "priority": "Low"}
]"#;
        let batch = parse_batch(reply).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.dropped, 2);
    }

    #[test]
    fn all_invalid_records_is_an_error() {
        let reply = r#"[{"description": "only field"}]"#;
        assert!(parse_batch(reply).is_err());
    }

    #[test]
    fn missing_array_is_an_error() {
        assert!(parse_batch("I could not generate test cases.").is_err());
        assert!(parse_batch("{\"description\": \"object, not array\"}").is_err());
    }

    #[test]
    fn array_boundaries_ignore_surrounding_prose() {
        let text = "prefix [1, 2, 3] suffix";
        assert_eq!(extract_json_array(text), Some("[1, 2, 3]"));
        assert_eq!(extract_json_array("no array here"), None);
        assert_eq!(extract_json_array("] backwards ["), None);
    }

    #[test]
    fn fence_stripping_variants() {
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("[1]"), "[1]");
        assert_eq!(strip_code_fences("  [1]  "), "[1]");
    }

    #[test]
    fn first_integer_scans_prose() {
        assert_eq!(first_integer("I estimate around 85 test cases."), Some(85));
        assert_eq!(first_integer("120"), Some(120));
        assert_eq!(first_integer("none"), None);
    }

    #[test]
    fn title_case_normalizes_priority() {
        assert_eq!(title_case("high"), "High");
        assert_eq!(title_case("MEDIUM"), "Medium");
        assert_eq!(title_case("Low"), "Low");
        assert_eq!(title_case(""), "");
    }
}
