//! Request normalization
//!
//! Turns heterogeneous raw provider payloads into one uniform view model for
//! the dashboard. Dispatch is by detected payload shape
//! ([`provider::ProviderKind`]); each variant has a pure extraction function
//! and shares the status/error policy implemented here.
//!
//! Nothing in this module may panic on malformed input: every nested field
//! access degrades to an empty string, and a body that is not JSON at all
//! yields a per-record sentinel text instead of failing the page.

mod chat;
mod claude;
mod custom;
mod function_call;
mod gemini;
mod image;
pub mod provider;

#[cfg(test)]
mod tests;

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

use crate::core::constants::{DEFAULT_CACHE_REFERENCE_ID, STATUS_SENTINEL_CANCELLED};
use crate::data::types::RawLoggedRequest;
use crate::domain::pricing::{PricingService, TokenUsage};
use crate::utils::json::str_or_empty;
use crate::utils::time::micros_to_datetime;

use provider::ProviderKind;

/// Display text when the stored request was rejected for size
pub const OVERSIZED_REQUEST_MARKER: &str = "LlmLens Message: Input too large";

/// Fallback error field written by the gateway when a provider returns no
/// structured error body
const GATEWAY_ERROR_FIELD: &str = "llmlens_error";

const PARSE_ERROR_REQUEST: &str = "ERROR: failed to parse request";
const PARSE_ERROR_RESPONSE: &str = "ERROR: failed to parse response";

/// Display status of a normalized request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum StatusType {
    Success,
    Error,
    Pending,
    Cached,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestStatus {
    pub status_type: StatusType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
}

/// User feedback attached to a request, when present
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: String,
    pub rating: Option<bool>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Opaque render descriptor: tells the presentation layer which view to use
/// without it re-parsing provider payloads
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RenderPayload {
    Chat {
        messages: Vec<ChatMessage>,
    },
    Completion {
        prompt: String,
        completion: String,
    },
    Image {
        prompt: String,
        url: String,
    },
    FunctionCall {
        name: String,
        arguments: String,
    },
    Raw {
        request: JsonValue,
        response: JsonValue,
    },
}

/// The uniform view model produced from one raw record
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRequest {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    pub request_text: String,
    pub response_text: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub latency_ms: i64,
    pub time_to_first_token_ms: i64,
    /// `None` means "no pricing model for this provider/model pair", which
    /// is a different fact from a computed cost of zero
    pub cost: Option<f64>,
    pub status: RequestStatus,
    pub user: String,
    pub country_code: String,
    pub path: String,
    pub custom_properties: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    pub render_payload: RenderPayload,
}

/// Completion state derived from the stored status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatusClass {
    /// 200, 201, or the cancellation sentinel: the call produced a payload
    Completed,
    /// 0: the call is still in flight
    Pending,
    /// Everything else, including the timeout and threat sentinels
    Failed,
}

pub(crate) fn classify_status(status: i32) -> StatusClass {
    match status {
        200 | 201 | STATUS_SENTINEL_CANCELLED => StatusClass::Completed,
        0 => StatusClass::Pending,
        _ => StatusClass::Failed,
    }
}

/// Provider-specific extraction output
#[derive(Debug, Clone)]
pub(crate) struct SpecificFields {
    pub request_text: String,
    pub response_text: String,
    pub render_payload: RenderPayload,
}

enum ParsedBody {
    Empty,
    Json(JsonValue),
    Invalid,
}

fn parse_body(body: &str) -> ParsedBody {
    if body.is_empty() {
        return ParsedBody::Empty;
    }
    match serde_json::from_str(body) {
        Ok(value) => ParsedBody::Json(value),
        Err(_) => ParsedBody::Invalid,
    }
}

/// Error text for a failed call: structured error message, then the gateway
/// fallback field, then empty
pub(crate) fn failure_text(response: &JsonValue) -> String {
    let message = response
        .get("error")
        .and_then(|e| e.get("message"))
        .map(str_or_empty)
        .unwrap_or("");
    if !message.is_empty() {
        return message.to_string();
    }
    str_or_empty(response.get(GATEWAY_ERROR_FIELD).unwrap_or(&JsonValue::Null)).to_string()
}

/// A nested error object inside a 2xx payload wins over the success text
pub(crate) fn embedded_error_text(response: &JsonValue) -> Option<String> {
    let error = response.get("error")?;
    if error.is_null() {
        return None;
    }
    Some(str_or_empty(error.get("message").unwrap_or(&JsonValue::Null)).to_string())
}

/// Apply the shared status policy around a provider-specific success
/// extractor
pub(crate) fn response_text_by_policy<F>(
    class: StatusClass,
    response: &JsonValue,
    extract: F,
) -> String
where
    F: FnOnce(&JsonValue) -> String,
{
    match class {
        StatusClass::Pending => String::new(),
        StatusClass::Failed => failure_text(response),
        StatusClass::Completed => match embedded_error_text(response) {
            Some(message) => message,
            None => extract(response),
        },
    }
}

/// Render arbitrary message content as display text: strings pass through,
/// block arrays join their `text` fields, anything else is JSON
pub(crate) fn content_to_string(content: &JsonValue) -> String {
    match content {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(items) => items
            .iter()
            .map(|item| {
                let text = str_or_empty(item.get("text").unwrap_or(&JsonValue::Null));
                if text.is_empty() {
                    item.to_string()
                } else {
                    text.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

/// Shared request-text preference: oversized marker, explicit `prompt`, then
/// the last element of a `messages` array
pub(crate) fn base_request_text(request: &JsonValue) -> String {
    if request
        .get("too_large")
        .and_then(JsonValue::as_bool)
        .unwrap_or(false)
    {
        return OVERSIZED_REQUEST_MARKER.to_string();
    }
    if let Some(prompt) = request.get("prompt") {
        let text = content_to_string(prompt);
        if !text.is_empty() {
            return text;
        }
    }
    if let Some(JsonValue::Array(messages)) = request.get("messages")
        && let Some(last) = messages.last()
    {
        return content_to_string(last.get("content").unwrap_or(&JsonValue::Null));
    }
    String::new()
}

/// Recover a model name from the request path when the record has none.
/// Matches `/engines/<model>` and `models/<model>` segments.
pub(crate) fn model_from_path(path: &str) -> Option<String> {
    static ENGINES: OnceLock<Regex> = OnceLock::new();
    static MODELS: OnceLock<Regex> = OnceLock::new();
    let engines = ENGINES.get_or_init(|| Regex::new(r"/engines/([^/]+)").unwrap());
    let models = MODELS.get_or_init(|| Regex::new(r"models/([^/:]+)").unwrap());

    engines
        .captures(path)
        .or_else(|| models.captures(path))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|m| !m.is_empty())
}

fn resolve_model(raw: &RawLoggedRequest, request: &JsonValue, response: &JsonValue) -> String {
    let logged = raw.effective_model();
    if !logged.is_empty() {
        return logged.to_string();
    }
    let from_request = str_or_empty(request.get("model").unwrap_or(&JsonValue::Null));
    if !from_request.is_empty() {
        return from_request.to_string();
    }
    let from_response = str_or_empty(response.get("model").unwrap_or(&JsonValue::Null));
    if !from_response.is_empty() {
        return from_response.to_string();
    }
    model_from_path(&raw.path).unwrap_or_default()
}

fn parse_properties(properties_json: &str) -> HashMap<String, String> {
    if properties_json.is_empty() {
        return HashMap::new();
    }
    match serde_json::from_str::<HashMap<String, JsonValue>>(properties_json) {
        Ok(map) => map
            .into_iter()
            .map(|(k, v)| {
                let value = match v {
                    JsonValue::String(s) => s,
                    other => other.to_string(),
                };
                (k, value)
            })
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse request properties, dropping");
            HashMap::new()
        }
    }
}

fn feedback_from_raw(raw: &RawLoggedRequest) -> Option<Feedback> {
    if raw.feedback_id.is_empty() {
        return None;
    }
    Some(Feedback {
        id: raw.feedback_id.clone(),
        rating: match raw.feedback_rating {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        },
        created_at: micros_to_datetime(raw.feedback_created_at),
    })
}

/// Normalize one raw record. Pure: the same row and pricing table always
/// produce a structurally identical result.
pub fn normalize_request(raw: &RawLoggedRequest, pricing: &PricingService) -> NormalizedRequest {
    let parsed_request = parse_body(&raw.request_body);
    let parsed_response = parse_body(&raw.response_body);

    let request_json = match &parsed_request {
        ParsedBody::Json(v) => v.clone(),
        _ => JsonValue::Null,
    };
    let response_json = match &parsed_response {
        ParsedBody::Json(v) => v.clone(),
        _ => JsonValue::Null,
    };

    let model = resolve_model(raw, &request_json, &response_json);
    let kind = provider::detect(&raw.provider, &model, &raw.path, &request_json);
    let class = classify_status(raw.status);

    let mut specific = match kind {
        ProviderKind::Chat => chat::extract_chat(&request_json, &response_json, class),
        ProviderKind::Completion => chat::extract_completion(&request_json, &response_json, class),
        ProviderKind::Claude => claude::extract(&request_json, &response_json, class),
        ProviderKind::Gemini => gemini::extract(&request_json, &response_json, class),
        ProviderKind::Image => image::extract(&request_json, &response_json, class),
        ProviderKind::FunctionCall => function_call::extract(&request_json, &response_json, class),
        ProviderKind::Custom => custom::extract(&request_json, &response_json, class),
    };

    // A body that is not JSON at all gets a per-record sentinel, isolated to
    // this row
    if matches!(parsed_request, ParsedBody::Invalid) {
        specific.request_text = PARSE_ERROR_REQUEST.to_string();
    }
    if matches!(parsed_response, ParsedBody::Invalid) && class != StatusClass::Pending {
        specific.response_text = PARSE_ERROR_RESPONSE.to_string();
    }

    let is_cached = !raw.cache_reference_id.is_empty()
        && raw.cache_reference_id != DEFAULT_CACHE_REFERENCE_ID;

    let status = if is_cached {
        RequestStatus {
            status_type: StatusType::Cached,
            code: Some(raw.status),
        }
    } else {
        match class {
            StatusClass::Pending => RequestStatus {
                status_type: StatusType::Pending,
                code: None,
            },
            StatusClass::Completed => RequestStatus {
                status_type: StatusType::Success,
                code: Some(raw.status),
            },
            StatusClass::Failed => RequestStatus {
                status_type: StatusType::Error,
                code: Some(raw.status),
            },
        }
    };

    // Cache hits cost $0 by policy; everything else defers to the pricing
    // table and reports "unsupported" as None
    let cost = if is_cached {
        Some(0.0)
    } else {
        pricing.model_cost(
            Some(&raw.provider),
            &model,
            &TokenUsage {
                prompt_tokens: raw.prompt_tokens,
                completion_tokens: raw.completion_tokens,
                prompt_cache_read_tokens: raw.prompt_cache_read_tokens,
                prompt_cache_write_tokens: raw.prompt_cache_write_tokens,
            },
        )
    };

    NormalizedRequest {
        id: raw.request_id.clone(),
        created_at: micros_to_datetime(raw.request_created_at),
        provider: raw.provider.clone(),
        model,
        request_text: specific.request_text,
        response_text: specific.response_text,
        prompt_tokens: raw.prompt_tokens,
        completion_tokens: raw.completion_tokens,
        total_tokens: raw.total_tokens,
        latency_ms: raw.latency,
        time_to_first_token_ms: raw.time_to_first_token,
        cost,
        status,
        user: raw.user_id.clone(),
        country_code: raw.country_code.clone(),
        path: raw.path.clone(),
        custom_properties: parse_properties(&raw.properties_json),
        feedback: feedback_from_raw(raw),
        render_payload: specific.render_payload,
    }
}

/// Normalize a page of rows and report the distinct custom-property keys
/// observed, for dynamic column rendering
pub fn normalize_page(
    rows: &[RawLoggedRequest],
    pricing: &PricingService,
) -> (Vec<NormalizedRequest>, Vec<String>) {
    let mut property_keys = BTreeSet::new();
    let normalized: Vec<NormalizedRequest> = rows
        .iter()
        .map(|raw| {
            let request = normalize_request(raw, pricing);
            for key in request.custom_properties.keys() {
                property_keys.insert(key.clone());
            }
            request
        })
        .collect();
    (normalized, property_keys.into_iter().collect())
}
