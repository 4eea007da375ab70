//! Tool/function-calling chat extraction

use serde_json::Value as JsonValue;

use super::{
    RenderPayload, SpecificFields, StatusClass, base_request_text, content_to_string,
    response_text_by_policy,
};
use crate::utils::json::str_or_empty;

/// `(name, arguments)` of the first call in the response, if any
fn first_call(response: &JsonValue) -> Option<(String, String)> {
    let message = response
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.last())
        .and_then(|c| c.get("message"))?;

    if let Some(JsonValue::Array(tool_calls)) = message.get("tool_calls")
        && let Some(call) = tool_calls.first()
    {
        let function = call.get("function").unwrap_or(&JsonValue::Null);
        return Some((
            str_or_empty(function.get("name").unwrap_or(&JsonValue::Null)).to_string(),
            str_or_empty(function.get("arguments").unwrap_or(&JsonValue::Null)).to_string(),
        ));
    }

    // Deprecated single function_call field
    let function_call = message.get("function_call")?;
    Some((
        str_or_empty(function_call.get("name").unwrap_or(&JsonValue::Null)).to_string(),
        str_or_empty(function_call.get("arguments").unwrap_or(&JsonValue::Null)).to_string(),
    ))
}

fn success_text(response: &JsonValue) -> String {
    if let Some((name, arguments)) = first_call(response) {
        return format!("{}({})", name, arguments);
    }
    // Plain content response to a tool-enabled request
    content_to_string(
        response
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.last())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .unwrap_or(&JsonValue::Null),
    )
}

pub(super) fn extract(
    request: &JsonValue,
    response: &JsonValue,
    class: StatusClass,
) -> SpecificFields {
    let request_text = base_request_text(request);
    let response_text = response_text_by_policy(class, response, success_text);

    let (name, arguments) = if class == StatusClass::Completed {
        first_call(response).unwrap_or_default()
    } else {
        Default::default()
    };

    SpecificFields {
        request_text,
        response_text,
        render_payload: RenderPayload::FunctionCall { name, arguments },
    }
}
