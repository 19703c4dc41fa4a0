//! Canonical content extraction from arbitrary handler results.
//!
//! Handlers return whatever shape their backend produced: plain strings,
//! JSON-looking strings, `{ "content": ... }` envelopes, arrays of chunks,
//! single-key wrappers. `extract_content` reduces all of them to the one
//! string that successors receive.

use serde_json::Value;

/// Keys probed, in order, on object results.
pub const CONTENT_KEYS: [&str; 6] = ["content", "output", "result", "response", "text", "message"];

/// Extract the canonical string content of a handler result.
///
/// Precedence:
/// 1. strings are kept unless they look like JSON (`{` or `[` first)
///    and parse, in which case the parsed value is normalized instead;
/// 2. arrays normalize each element and join with `\n`;
/// 3. objects yield the first non-null key of [`CONTENT_KEYS`];
/// 4. single-key objects unwrap their only value;
/// 5. other objects are pretty-printed;
/// 6. numbers and booleans are stringified, `null` becomes `""`.
///
/// Total and idempotent: the result is re-normalized until it stops
/// changing, so feeding the output back in returns it unchanged. Joined
/// array text can form new JSON, so one pass is not always enough.
pub fn extract_content(raw: &Value) -> String {
    let mut current = normalize_value(raw);
    let mut passes = 0usize;
    loop {
        let next = normalize_str(&current);
        if next == current {
            return current;
        }
        // Guard against text that never settles; no such input is known.
        passes += 1;
        if passes > current.len() {
            tracing::warn!(passes, "content did not settle, returning last pass");
            return next;
        }
        current = next;
    }
}

fn normalize_str(s: &str) -> String {
    let trimmed = s.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(parsed) = serde_json::from_str::<Value>(s) {
            return normalize_value(&parsed);
        }
    }
    s.to_string()
}

fn normalize_value(value: &Value) -> String {
    match value {
        Value::String(s) => normalize_str(s),
        Value::Array(items) => items
            .iter()
            .map(normalize_value)
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => {
            for key in CONTENT_KEYS {
                if let Some(inner) = map.get(key) {
                    if !inner.is_null() {
                        return normalize_value(inner);
                    }
                }
            }
            if map.len() == 1 {
                if let Some(inner) = map.values().next() {
                    return normalize_value(inner);
                }
            }
            serde_json::to_string_pretty(value).unwrap_or_default()
        }
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extract_content_str(raw: &str) -> String {
        extract_content(&Value::String(raw.to_string()))
    }

    /// Encode `text` as a JSON array with one string per line, so the
    /// array only becomes JSON again once its elements are joined.
    fn wrap_lines(text: &str) -> String {
        let lines: Vec<String> = text
            .lines()
            .map(|line| Value::String(line.to_string()).to_string())
            .collect();
        format!("[\n{}\n]", lines.join(",\n"))
    }

    // -----------------------------------------------------------------------
    // Strings
    // -----------------------------------------------------------------------

    #[test]
    fn test_plain_string_unchanged() {
        assert_eq!(extract_content(&json!("hello world")), "hello world");
    }

    #[test]
    fn test_json_string_is_parsed() {
        let raw = json!(r#"{"content": "from json"}"#);
        assert_eq!(extract_content(&raw), "from json");
    }

    #[test]
    fn test_json_string_with_leading_whitespace_is_parsed() {
        assert_eq!(extract_content_str("  \n[\"a\", \"b\"]"), "a\nb");
    }

    #[test]
    fn test_broken_json_string_falls_back() {
        let raw = "{not really json";
        assert_eq!(extract_content_str(raw), raw);
    }

    // -----------------------------------------------------------------------
    // Arrays and objects
    // -----------------------------------------------------------------------

    #[test]
    fn test_array_joined_with_newlines() {
        let raw = json!(["first", { "text": "second" }, 3]);
        assert_eq!(extract_content(&raw), "first\nsecond\n3");
    }

    #[test]
    fn test_content_key_precedence() {
        let raw = json!({ "text": "t", "output": "o", "message": "m" });
        assert_eq!(extract_content(&raw), "o");

        let raw = json!({ "result": "r", "content": "c" });
        assert_eq!(extract_content(&raw), "c");

        let raw = json!({ "message": "m", "status": 200 });
        assert_eq!(extract_content(&raw), "m");
    }

    #[test]
    fn test_null_content_key_is_skipped() {
        let raw = json!({ "content": null, "response": "fallback" });
        assert_eq!(extract_content(&raw), "fallback");
    }

    #[test]
    fn test_nested_content_is_normalized() {
        let raw = json!({ "result": { "choices": [{ "message": "deep" }] } });
        assert_eq!(extract_content(&raw), "deep");
    }

    #[test]
    fn test_single_key_wrapper_unwrapped() {
        let raw = json!({ "data": { "analysis": "bullish" } });
        assert_eq!(extract_content(&raw), "bullish");
    }

    #[test]
    fn test_multi_key_object_pretty_printed() {
        let raw = json!({ "a": 1, "b": 2 });
        assert_eq!(extract_content(&raw), "{\n  \"a\": 1,\n  \"b\": 2\n}");
    }

    #[test]
    fn test_scalars() {
        assert_eq!(extract_content(&json!(42)), "42");
        assert_eq!(extract_content(&json!(1.5)), "1.5");
        assert_eq!(extract_content(&json!(true)), "true");
        assert_eq!(extract_content(&Value::Null), "");
    }

    #[test]
    fn test_empty_shapes() {
        assert_eq!(extract_content(&json!([])), "");
        assert_eq!(extract_content(&json!({})), "{}");
        assert_eq!(extract_content(&json!("")), "");
    }

    // -----------------------------------------------------------------------
    // Idempotence
    // -----------------------------------------------------------------------

    #[test]
    fn test_idempotent_on_varied_shapes() {
        let samples = vec![
            json!("plain"),
            json!(r#"{"output": "{\"text\": \"twice wrapped\"}"}"#),
            json!({ "content": "{\"text\": \"inner\"}" }),
            json!(["[1", "2]"]),
            json!({ "a": "{\"content\": \"x\"}", "b": [1, 2] }),
            json!([{ "x": 1, "y": 2 }, "tail"]),
            json!({}),
            json!(null),
        ];

        for raw in samples {
            let once = extract_content(&raw);
            let twice = extract_content_str(&once);
            assert_eq!(once, twice, "not idempotent for {raw}");
        }
    }

    #[test]
    fn test_join_formed_json_settles_at_any_depth() {
        let mut text = "done".to_string();
        for _ in 0..20 {
            text = wrap_lines(&text);
        }
        let once = extract_content(&json!(text));
        assert_eq!(once, "done");
        assert_eq!(extract_content_str(&once), once);
    }

    #[test]
    fn test_string_field_holding_json_is_unwrapped() {
        let raw = json!({ "content": "{\"text\": \"inner\"}" });
        assert_eq!(extract_content(&raw), "inner");
    }
}
