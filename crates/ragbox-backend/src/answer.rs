//! Turns whatever body the backend sends back into displayable answer text.
//!
//! The backend is not held to a response schema, so extraction is an ordered
//! list of strategies applied until one yields a non-empty result. The chain
//! always produces text; a completely unreadable response degrades to a
//! fixed placeholder at the call site.

use serde_json::Value;

/// Shown when the response body could not be read at all.
pub const PARSE_FAILURE_PLACEHOLDER: &str = "Received response, but could not parse it.";

/// Recognized answer fields, in preference order.
const ANSWER_FIELDS: &[&str] = &["answer", "text", "result", "response"];

type Strategy = fn(&Value) -> Option<String>;

/// Applied in order; the first non-empty result wins. A structured body that
/// matches no strategy is pretty-serialized as a last resort.
const STRATEGIES: &[Strategy] = &[named_field, bare_string];

/// Extracts answer text from a 2xx response body. `is_json` reflects the
/// response content type; non-JSON bodies are used as raw text.
pub fn extract(body: &str, is_json: bool) -> String {
    if is_json {
        if let Ok(value) = serde_json::from_str::<Value>(body) {
            return extract_from_value(&value);
        }
        // Mislabeled content type; fall through to the raw text.
    }
    body.to_owned()
}

fn extract_from_value(value: &Value) -> String {
    for strategy in STRATEGIES {
        if let Some(text) = strategy(value) {
            if !text.is_empty() {
                return text;
            }
        }
    }
    serde_json::to_string_pretty(value).unwrap_or_else(|_| PARSE_FAILURE_PLACEHOLDER.to_owned())
}

fn named_field(value: &Value) -> Option<String> {
    ANSWER_FIELDS
        .iter()
        .filter_map(|field| value.get(field).and_then(Value::as_str))
        .find(|text| !text.is_empty())
        .map(str::to_owned)
}

fn bare_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_fields_follow_preference_order() {
        let body = r#"{"response":"last","answer":"first"}"#;
        assert_eq!(extract(body, true), "first");

        let body = r#"{"response":"Paris"}"#;
        assert_eq!(extract(body, true), "Paris");
    }

    #[test]
    fn empty_candidate_fields_are_skipped() {
        let body = r#"{"answer":"","text":"fallback"}"#;
        assert_eq!(extract(body, true), "fallback");
    }

    #[test]
    fn non_string_fields_are_skipped() {
        let body = r#"{"answer":42,"text":"words"}"#;
        assert_eq!(extract(body, true), "words");
    }

    #[test]
    fn bare_string_body_is_used_directly() {
        assert_eq!(extract(r#""just text""#, true), "just text");
    }

    #[test]
    fn unrecognized_object_is_serialized() {
        let extracted = extract(r#"{"chunks":[1,2]}"#, true);
        assert!(extracted.contains("\"chunks\""));
    }

    #[test]
    fn non_json_body_is_raw_text() {
        assert_eq!(extract("plain reply", false), "plain reply");
    }

    #[test]
    fn mislabeled_json_falls_back_to_raw_text() {
        assert_eq!(extract("not json at all", true), "not json at all");
    }
}
