use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::PipelineError;
use crate::utils::strip_control_chars;

/// Balanced `{ ... }` spans of `raw`, in order of their opening brace.
///
/// Braces inside JSON string literals are ignored, so a `}` in a command
/// string does not close the object early. A span is only reported once its
/// closing brace is found.
pub fn balanced_objects(raw: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escape = false;

    for (index, ch) in raw.char_indices() {
        let Some(begin) = start else {
            if ch == '{' {
                start = Some(index);
                depth = 0;
                in_string = false;
                escape = false;
            }
            continue;
        };

        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                if depth == 0 {
                    spans.push(&raw[begin..index + ch.len_utf8()]);
                    start = None;
                } else {
                    depth -= 1;
                }
            }
            _ => {}
        }
    }

    spans
}

/// Find the first JSON object embedded in free-form model text.
///
/// Candidates are tried in order; control characters are stripped from each
/// before parsing. Prose around the object, nested objects and stray
/// `{placeholder}` spans in the commentary are all tolerated.
pub fn extract_json_object(raw: &str) -> Result<Value, PipelineError> {
    let candidates = balanced_objects(raw);
    if candidates.is_empty() {
        return Err(PipelineError::MalformedResponse("no JSON object found in response".to_string()));
    }

    let mut last_error = String::new();
    for candidate in candidates {
        let cleaned = strip_control_chars(candidate);
        match serde_json::from_str::<Value>(&cleaned) {
            Ok(value @ Value::Object(_)) => return Ok(value),
            Ok(_) => continue,
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(PipelineError::MalformedResponse(format!("JSON failed to parse: {}", last_error)))
}

/// Extract and deserialize in one step.
pub fn extract_as<T: DeserializeOwned>(raw: &str) -> Result<T, PipelineError> {
    let value = extract_json_object(raw)?;
    serde_json::from_value(value)
        .map_err(|e| PipelineError::MalformedResponse(format!("unexpected JSON shape: {}", e)))
}
