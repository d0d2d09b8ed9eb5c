use regex::Regex;
use serde_json::{json, Value};

/// Recover a structured JSON value from free-form model text.
///
/// Strategies are tried in a fixed order: direct parse, then the contents of
/// fenced code blocks, then the first brace-delimited substring. Direct parse
/// is the cheapest and most common; fenced extraction handles models that
/// ignore "no markdown" instructions; brace extraction is the last resort and
/// must not fire before the other two are exhausted.
pub fn parse_json_response(text: &str) -> Value {
    if text.is_empty() {
        return json!({"error": "Empty response from LLM"});
    }

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return value;
    }

    let fence = Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").unwrap();
    for captures in fence.captures_iter(text) {
        if let Ok(value) = serde_json::from_str::<Value>(&captures[1]) {
            return value;
        }
    }

    let braces = Regex::new(r"\{[\s\S]*\}").unwrap();
    for found in braces.find_iter(text) {
        if let Ok(value) = serde_json::from_str::<Value>(found.as_str()) {
            return value;
        }
    }

    json!({"error": "Could not parse JSON from response", "raw_response": text})
}
