//! Structured-output extraction
//!
//! For remote tools with a JSON output mode. The whole of stdout is tried
//! first; if banners surround the document, the first line that parses as a
//! JSON object or array is used.

use serde_json::Value;

use crate::engine::error::ActionError;

/// Locate the JSON document in `stdout`
pub fn parse_document(stdout: &str) -> Option<Value> {
    if let Ok(doc) = serde_json::from_str::<Value>(stdout.trim()) {
        return Some(doc);
    }
    stdout.lines().find_map(|line| {
        let line = line.trim();
        if line.starts_with('{') || line.starts_with('[') {
            serde_json::from_str(line).ok()
        } else {
            None
        }
    })
}

/// Apply an RFC 6901 `pointer` to the JSON document in `stdout`
///
/// Strings come back unquoted; other values as compact JSON. A missing
/// pointer target is `Ok(None)`; output without any JSON is a parse error.
pub fn extract_json(stdout: &str, pointer: &str) -> Result<Option<String>, ActionError> {
    if !pointer.is_empty() && !pointer.starts_with('/') {
        return Err(ActionError::invalid(format!(
            "JSON pointer '{}' must be empty or start with '/'",
            pointer
        )));
    }
    let doc = parse_document(stdout)
        .ok_or_else(|| ActionError::parse("no JSON document found in command output"))?;
    Ok(doc.pointer(pointer).map(render))
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
