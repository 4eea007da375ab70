//! Fallback extraction for unrecognized payload shapes
//!
//! Echoes raw JSON instead of failing, so unmapped providers still render.

use serde_json::Value as JsonValue;

use super::{
    RenderPayload, SpecificFields, StatusClass, base_request_text, response_text_by_policy,
};

fn compact_or_empty(value: &JsonValue) -> String {
    if value.is_null() {
        String::new()
    } else {
        value.to_string()
    }
}

pub(super) fn extract(
    request: &JsonValue,
    response: &JsonValue,
    class: StatusClass,
) -> SpecificFields {
    let mut request_text = base_request_text(request);
    if request_text.is_empty() {
        request_text = compact_or_empty(request);
    }
    let response_text = response_text_by_policy(class, response, compact_or_empty);

    SpecificFields {
        request_text,
        response_text,
        render_payload: RenderPayload::Raw {
            request: request.clone(),
            response: response.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_shapes_echo_json() {
        let request = json!({"input": "embed me"});
        let response = json!({"embedding": [0.1, 0.2]});
        let fields = extract(&request, &response, StatusClass::Completed);
        assert_eq!(fields.request_text, r#"{"input":"embed me"}"#);
        assert_eq!(fields.response_text, r#"{"embedding":[0.1,0.2]}"#);
    }

    #[test]
    fn prompt_still_preferred_when_present() {
        let request = json!({"prompt": "classify this", "labels": ["a", "b"]});
        let fields = extract(&request, &JsonValue::Null, StatusClass::Pending);
        assert_eq!(fields.request_text, "classify this");
        assert_eq!(fields.response_text, "");
    }
}
