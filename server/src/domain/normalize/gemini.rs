//! Gemini extraction
//!
//! Gemini payloads wrap text in `contents[].parts[].text` on the way in and
//! `candidates[].content.parts[].text` on the way out. Streamed responses
//! arrive as an array of chunks; both single-object and array shapes are
//! accepted everywhere.

use serde_json::Value as JsonValue;

use super::{RenderPayload, SpecificFields, StatusClass, response_text_by_policy};
use crate::utils::json::str_or_empty;

/// Normalize "object or array of objects" into a slice-like iterator
fn as_list(value: &JsonValue) -> Vec<&JsonValue> {
    match value {
        JsonValue::Array(items) => items.iter().collect(),
        JsonValue::Null => Vec::new(),
        other => vec![other],
    }
}

fn parts_text(container: &JsonValue) -> String {
    as_list(container.get("parts").unwrap_or(&JsonValue::Null))
        .iter()
        .map(|part| str_or_empty(part.get("text").unwrap_or(&JsonValue::Null)))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn request_text(request: &JsonValue) -> String {
    let contents = as_list(request.get("contents").unwrap_or(&JsonValue::Null));
    contents.last().map(|last| parts_text(last)).unwrap_or_default()
}

fn success_text(response: &JsonValue) -> String {
    as_list(response)
        .iter()
        .flat_map(|chunk| as_list(chunk.get("candidates").unwrap_or(&JsonValue::Null)))
        .flat_map(|candidate| as_list(candidate.get("content").unwrap_or(&JsonValue::Null)))
        .map(parts_text)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("")
}

pub(super) fn extract(
    request: &JsonValue,
    response: &JsonValue,
    class: StatusClass,
) -> SpecificFields {
    let request_text = request_text(request);
    let response_text = response_text_by_policy(class, response, success_text);

    SpecificFields {
        request_text: request_text.clone(),
        response_text: response_text.clone(),
        render_payload: RenderPayload::Completion {
            prompt: request_text,
            completion: response_text,
        },
    }
}
