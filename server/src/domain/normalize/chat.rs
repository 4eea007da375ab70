//! OpenAI-style chat and legacy completion extraction

use serde_json::Value as JsonValue;

use super::{
    ChatMessage, RenderPayload, SpecificFields, StatusClass, base_request_text, content_to_string,
    response_text_by_policy,
};
use crate::utils::json::str_or_empty;

fn last_choice_message_content(response: &JsonValue) -> String {
    let Some(JsonValue::Array(choices)) = response.get("choices") else {
        return String::new();
    };
    let Some(last) = choices.last() else {
        return String::new();
    };
    content_to_string(
        last.get("message")
            .and_then(|m| m.get("content"))
            .unwrap_or(&JsonValue::Null),
    )
}

fn request_messages(request: &JsonValue) -> Vec<ChatMessage> {
    let Some(JsonValue::Array(messages)) = request.get("messages") else {
        return Vec::new();
    };
    messages
        .iter()
        .map(|m| ChatMessage {
            role: str_or_empty(m.get("role").unwrap_or(&JsonValue::Null)).to_string(),
            content: content_to_string(m.get("content").unwrap_or(&JsonValue::Null)),
        })
        .collect()
}

pub(super) fn extract_chat(
    request: &JsonValue,
    response: &JsonValue,
    class: StatusClass,
) -> SpecificFields {
    let request_text = base_request_text(request);
    let response_text = response_text_by_policy(class, response, last_choice_message_content);

    let mut messages = request_messages(request);
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

fn last_choice_text(response: &JsonValue) -> String {
    let Some(JsonValue::Array(choices)) = response.get("choices") else {
        return String::new();
    };
    choices
        .last()
        .map(|c| str_or_empty(c.get("text").unwrap_or(&JsonValue::Null)).to_string())
        .unwrap_or_default()
}

pub(super) fn extract_completion(
    request: &JsonValue,
    response: &JsonValue,
    class: StatusClass,
) -> SpecificFields {
    let request_text = base_request_text(request);
    let response_text = response_text_by_policy(class, response, last_choice_text);

    SpecificFields {
        request_text: request_text.clone(),
        response_text: response_text.clone(),
        render_payload: RenderPayload::Completion {
            prompt: request_text,
            completion: response_text,
        },
    }
}
