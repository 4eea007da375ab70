//! Image generation extraction (DALL-E, Flux, Stable Diffusion style)

use serde_json::Value as JsonValue;

use super::{RenderPayload, SpecificFields, StatusClass, response_text_by_policy};
use crate::utils::json::str_or_empty;

fn first_data_entry(response: &JsonValue) -> Option<&JsonValue> {
    match response.get("data") {
        Some(JsonValue::Array(items)) => items.first(),
        _ => None,
    }
}

fn success_text(response: &JsonValue) -> String {
    // Prefer the model's revised prompt as display text; the image itself
    // lives in the render payload
    first_data_entry(response)
        .map(|entry| str_or_empty(entry.get("revised_prompt").unwrap_or(&JsonValue::Null)))
        .unwrap_or("")
        .to_string()
}

pub(super) fn extract(
    request: &JsonValue,
    response: &JsonValue,
    class: StatusClass,
) -> SpecificFields {
    let prompt = str_or_empty(request.get("prompt").unwrap_or(&JsonValue::Null)).to_string();
    let response_text = response_text_by_policy(class, response, success_text);

    let url = first_data_entry(response)
        .map(|entry| {
            let url = str_or_empty(entry.get("url").unwrap_or(&JsonValue::Null));
            if url.is_empty() && entry.get("b64_json").is_some() {
                "data:image/png;base64"
            } else {
                url
            }
        })
        .unwrap_or("")
        .to_string();

    SpecificFields {
        request_text: prompt.clone(),
        response_text,
        render_payload: RenderPayload::Image { prompt, url },
    }
}
