//! Anthropic messages extraction
//!
//! Handles both the current block-content shape (`content: [{type, text}]`)
//! and the legacy `choices` shape some gateways still emit.

use serde_json::Value as JsonValue;

use super::{
    ChatMessage, RenderPayload, SpecificFields, StatusClass, base_request_text, content_to_string,
    response_text_by_policy,
};
use crate::utils::json::str_or_empty;

fn success_text(response: &JsonValue) -> String {
    // Current format: top-level content blocks
    if let Some(JsonValue::Array(blocks)) = response.get("content") {
        if let Some(text_block) = blocks
            .iter()
            .find(|b| str_or_empty(b.get("type").unwrap_or(&JsonValue::Null)) == "text")
        {
            return str_or_empty(text_block.get("text").unwrap_or(&JsonValue::Null))
                .trim()
                .to_string();
        }
        // Tool-use only responses render as a call signature
        if let Some(tool_use) = blocks
            .iter()
            .find(|b| str_or_empty(b.get("type").unwrap_or(&JsonValue::Null)) == "tool_use")
        {
            let name = str_or_empty(tool_use.get("name").unwrap_or(&JsonValue::Null));
            let input = tool_use.get("input").cloned().unwrap_or(JsonValue::Null);
            return format!("{}({})", name, input);
        }
    }

    // Legacy format: choices[0].message.content
    if let Some(JsonValue::Array(choices)) = response.get("choices")
        && let Some(first) = choices.first()
    {
        return content_to_string(
            first
                .get("message")
                .and_then(|m| m.get("content"))
                .unwrap_or(&JsonValue::Null),
        );
    }

    // Single completion field on very old payloads
    str_or_empty(response.get("completion").unwrap_or(&JsonValue::Null)).to_string()
}

pub(super) fn extract(
    request: &JsonValue,
    response: &JsonValue,
    class: StatusClass,
) -> SpecificFields {
    let request_text = base_request_text(request);
    let response_text = response_text_by_policy(class, response, success_text);

    let mut messages: Vec<ChatMessage> = match request.get("messages") {
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(|m| ChatMessage {
                role: str_or_empty(m.get("role").unwrap_or(&JsonValue::Null)).to_string(),
                content: content_to_string(m.get("content").unwrap_or(&JsonValue::Null)),
            })
            .collect(),
        _ => Vec::new(),
    };
    if class == StatusClass::Completed && !response_text.is_empty() {
        messages.push(ChatMessage {
            role: "assistant".to_string(),
            content: response_text.clone(),
        });
    }

    SpecificFields {
        request_text,
        response_text,
        render_payload: RenderPayload::Chat { messages },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn block_content_text_wins() {
        let response = json!({"content": [
            {"type": "tool_use", "name": "lookup", "input": {}},
            {"type": "text", "text": "  the answer  "}
        ]});
        let fields = extract(&JsonValue::Null, &response, StatusClass::Completed);
        assert_eq!(fields.response_text, "the answer");
    }

    #[test]
    fn tool_use_only_renders_call_signature() {
        let response = json!({"content": [
            {"type": "tool_use", "name": "get_weather", "input": {"city": "Oslo"}}
        ]});
        let fields = extract(&JsonValue::Null, &response, StatusClass::Completed);
        assert_eq!(fields.response_text, r#"get_weather({"city":"Oslo"})"#);
    }

    #[test]
    fn legacy_choices_shape_still_works() {
        let response = json!({"choices": [{"message": {"content": "legacy"}}]});
        let fields = extract(&JsonValue::Null, &response, StatusClass::Completed);
        assert_eq!(fields.response_text, "legacy");
    }

    #[test]
    fn embedded_error_wins_on_success_status() {
        let response = json!({
            "error": {"message": "overloaded"},
            "content": [{"type": "text", "text": "partial"}]
        });
        let fields = extract(&JsonValue::Null, &response, StatusClass::Completed);
        assert_eq!(fields.response_text, "overloaded");
    }

    #[test]
    fn block_array_request_content_joins_text() {
        let request = json!({"messages": [
            {"role": "user", "content": [{"type": "text", "text": "check this"}]}
        ]});
        let fields = extract(&request, &json!({}), StatusClass::Pending);
        assert_eq!(fields.request_text, "check this");
    }
}
