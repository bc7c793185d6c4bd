//! Tolerant JSON parsing for LLM output.
//!
//! Generators sometimes wrap their JSON reply in prose or code fences. The
//! fallback contract is: try the whole text first, then the first balanced
//! `{…}` substring. Anything past the first balanced object is ignored, so
//! a malformed object followed by a valid one is still an error.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Returns the first balanced `{…}` substring of `text`, if any.
///
/// Braces inside JSON strings are skipped, including escaped quotes.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses `text` as `T`, falling back to the first balanced `{…}` substring
/// when the full text is not valid JSON.
pub fn parse_loose<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    match serde_json::from_str(text) {
        Ok(parsed) => Ok(parsed),
        Err(err) => match extract_json(text) {
            Some(fragment) => serde_json::from_str(fragment),
            None => Err(err),
        },
    }
}

/// Renders a JSON value for textual context: strings verbatim, everything
/// else compact-serialized.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Probe {
        status: String,
    }

    #[test]
    fn parses_clean_json() {
        let probe: Probe = parse_loose(r#"{"status": "complete"}"#).unwrap();
        assert_eq!(probe.status, "complete");
    }

    #[test]
    fn extracts_json_surrounded_by_prose() {
        let text = r#"Here is my verdict: {"status": "complete"} — hope that helps!"#;
        let probe: Probe = parse_loose(text).unwrap();
        assert_eq!(probe.status, "complete");
    }

    #[test]
    fn handles_nested_objects_and_braces_in_strings() {
        let text = r#"Sure. {"status": "ok {not a brace}", "inner": {"a": 1}} trailing"#;
        let fragment = extract_json(text).unwrap();
        let value: Value = serde_json::from_str(fragment).unwrap();
        assert_eq!(value["status"], "ok {not a brace}");
        assert_eq!(value["inner"]["a"], 1);
    }

    #[test]
    fn rejects_text_without_json() {
        assert!(parse_loose::<Probe>("no json here").is_err());
        assert!(extract_json("only an opening {").is_none());
    }

    #[test]
    fn stringify_keeps_strings_verbatim() {
        assert_eq!(stringify(&json!("plain")), "plain");
        assert_eq!(stringify(&json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(stringify(&json!(42)), "42");
    }
}
