use serde_json::json;

use super::*;
use crate::domain::pricing::PricingService;

fn pricing() -> PricingService {
    PricingService::init().unwrap()
}

fn raw_record() -> RawLoggedRequest {
    RawLoggedRequest {
        request_id: "req-1".to_string(),
        organization_id: "org-1".to_string(),
        user_id: "user-1".to_string(),
        provider: "OPENAI".to_string(),
        model: "gpt-4".to_string(),
        model_override: String::new(),
        path: "/v1/chat/completions".to_string(),
        target_url: String::new(),
        country_code: "NO".to_string(),
        status: 200,
        latency: 820,
        time_to_first_token: 120,
        prompt_tokens: 10,
        completion_tokens: 2,
        total_tokens: 12,
        prompt_cache_read_tokens: 0,
        prompt_cache_write_tokens: 0,
        threat: false,
        cache_reference_id: crate::core::constants::DEFAULT_CACHE_REFERENCE_ID.to_string(),
        feedback_id: String::new(),
        feedback_rating: -1,
        feedback_created_at: 0,
        request_body: json!({"messages": [{"role": "user", "content": "hello"}]}).to_string(),
        response_body: json!({
            "choices": [{"message": {"role": "assistant", "content": "hi"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2}
        })
        .to_string(),
        properties_json: String::new(),
        request_created_at: 1_700_000_000_000_000,
        response_created_at: 1_700_000_000_820_000,
    }
}

#[test]
fn successful_chat_request_end_to_end() {
    let normalized = normalize_request(&raw_record(), &pricing());
    assert_eq!(normalized.response_text, "hi");
    assert_eq!(normalized.request_text, "hello");
    assert_eq!(normalized.prompt_tokens, 10);
    assert_eq!(normalized.completion_tokens, 2);
    assert_eq!(normalized.total_tokens, 12);
    assert_eq!(normalized.status.status_type, StatusType::Success);
    assert_eq!(normalized.status.code, Some(200));
}

#[test]
fn rate_limited_request_surfaces_error_message() {
    let mut raw = raw_record();
    raw.status = 429;
    raw.response_body = json!({"error": {"message": "rate limited"}}).to_string();
    let normalized = normalize_request(&raw, &pricing());
    assert_eq!(normalized.status.status_type, StatusType::Error);
    assert_eq!(normalized.status.code, Some(429));
    assert_eq!(normalized.response_text, "rate limited");
}

#[test]
fn gateway_error_field_is_the_fallback() {
    let mut raw = raw_record();
    raw.status = 502;
    raw.response_body = json!({"llmlens_error": "upstream connect error"}).to_string();
    let normalized = normalize_request(&raw, &pricing());
    assert_eq!(normalized.response_text, "upstream connect error");
}

#[test]
fn missing_nested_field_gives_empty_text() {
    let mut raw = raw_record();
    raw.response_body = json!({"choices": [{"finish_reason": "stop"}]}).to_string();
    let normalized = normalize_request(&raw, &pricing());
    assert_eq!(normalized.response_text, "");
    assert_eq!(normalized.status.status_type, StatusType::Success);
}

#[test]
fn embedded_error_in_2xx_payload_wins() {
    let mut raw = raw_record();
    raw.response_body = json!({
        "error": {"message": "model overloaded"},
        "choices": [{"message": {"content": "partial"}}]
    })
    .to_string();
    let normalized = normalize_request(&raw, &pricing());
    assert_eq!(normalized.response_text, "model overloaded");
}

#[test]
fn pending_request_has_no_code_and_empty_text() {
    let mut raw = raw_record();
    raw.status = 0;
    raw.response_body = String::new();
    let normalized = normalize_request(&raw, &pricing());
    assert_eq!(normalized.status.status_type, StatusType::Pending);
    assert_eq!(normalized.status.code, None);
    assert_eq!(normalized.response_text, "");
}

#[test]
fn cancelled_sentinel_is_a_completed_call() {
    let mut raw = raw_record();
    raw.status = -3;
    let normalized = normalize_request(&raw, &pricing());
    assert_eq!(normalized.status.status_type, StatusType::Success);
    assert_eq!(normalized.response_text, "hi");
}

#[test]
fn timeout_and_threat_sentinels_are_errors() {
    for sentinel in [-1, -2, -4] {
        let mut raw = raw_record();
        raw.status = sentinel;
        raw.response_body = String::new();
        let normalized = normalize_request(&raw, &pricing());
        assert_eq!(
            normalized.status.status_type,
            StatusType::Error,
            "sentinel {sentinel}"
        );
    }
}

#[test]
fn unsupported_model_cost_is_none_not_zero() {
    let mut raw = raw_record();
    raw.model = "in-house-llm-v2".to_string();
    let normalized = normalize_request(&raw, &pricing());
    assert_eq!(normalized.cost, None);
}

#[test]
fn supported_model_cost_is_positive() {
    let normalized = normalize_request(&raw_record(), &pricing());
    let cost = normalized.cost.unwrap();
    assert!(cost > 0.0);
}

#[test]
fn cache_hit_costs_zero_by_policy() {
    let mut raw = raw_record();
    raw.model = "in-house-llm-v2".to_string();
    raw.cache_reference_id = "7c3de90f-6cdd-4bb2-ab64-b1aeb1e9a34f".to_string();
    let normalized = normalize_request(&raw, &pricing());
    assert_eq!(normalized.status.status_type, StatusType::Cached);
    assert_eq!(normalized.cost, Some(0.0));
}

#[test]
fn normalization_is_idempotent() {
    let raw = raw_record();
    let svc = pricing();
    let first = normalize_request(&raw, &svc);
    let second = normalize_request(&raw, &svc);
    assert_eq!(first, second);
}

#[test]
fn unparseable_bodies_get_sentinel_text_without_failing() {
    let mut raw = raw_record();
    raw.request_body = "{not json".to_string();
    raw.response_body = "<html>502</html>".to_string();
    let normalized = normalize_request(&raw, &pricing());
    assert_eq!(normalized.request_text, "ERROR: failed to parse request");
    assert_eq!(normalized.response_text, "ERROR: failed to parse response");
}

#[test]
fn oversized_request_shows_marker() {
    let mut raw = raw_record();
    raw.request_body = json!({"too_large": true}).to_string();
    let normalized = normalize_request(&raw, &pricing());
    assert_eq!(normalized.request_text, OVERSIZED_REQUEST_MARKER);
}

#[test]
fn model_override_wins_for_display_and_pricing() {
    let mut raw = raw_record();
    raw.model_override = "gpt-4o".to_string();
    let normalized = normalize_request(&raw, &pricing());
    assert_eq!(normalized.model, "gpt-4o");
}

#[test]
fn model_recovered_from_path_when_record_has_none() {
    let mut raw = raw_record();
    raw.model = String::new();
    raw.request_body = json!({"contents": [{"parts": [{"text": "hi"}]}]}).to_string();
    raw.response_body = json!({}).to_string();
    raw.path = "/v1beta/models/gemini-1.5-pro:generateContent".to_string();
    let normalized = normalize_request(&raw, &pricing());
    assert_eq!(normalized.model, "gemini-1.5-pro");
}

#[test]
fn model_from_path_variants() {
    assert_eq!(
        model_from_path("/v1/engines/davinci/completions"),
        Some("davinci".to_string())
    );
    assert_eq!(
        model_from_path("/v1beta/models/gemini-pro:generateContent"),
        Some("gemini-pro".to_string())
    );
    assert_eq!(model_from_path("/v1/chat/completions"), None);
}

#[test]
fn properties_parse_with_non_string_values_stringified() {
    let mut raw = raw_record();
    raw.properties_json = json!({"environment": "prod", "retries": 3}).to_string();
    let normalized = normalize_request(&raw, &pricing());
    assert_eq!(
        normalized.custom_properties.get("environment"),
        Some(&"prod".to_string())
    );
    assert_eq!(
        normalized.custom_properties.get("retries"),
        Some(&"3".to_string())
    );
}

#[test]
fn malformed_properties_degrade_to_empty_map() {
    let mut raw = raw_record();
    raw.properties_json = "not json".to_string();
    let normalized = normalize_request(&raw, &pricing());
    assert!(normalized.custom_properties.is_empty());
}

#[test]
fn feedback_mapped_when_present() {
    let mut raw = raw_record();
    raw.feedback_id = "fb-1".to_string();
    raw.feedback_rating = 1;
    raw.feedback_created_at = 1_700_000_100_000_000;
    let normalized = normalize_request(&raw, &pricing());
    let feedback = normalized.feedback.unwrap();
    assert_eq!(feedback.rating, Some(true));

    let none = normalize_request(&raw_record(), &pricing());
    assert_eq!(none.feedback, None);
}

#[test]
fn page_collects_distinct_property_keys_sorted() {
    let mut a = raw_record();
    a.properties_json = json!({"environment": "prod", "app": "web"}).to_string();
    let mut b = raw_record();
    b.request_id = "req-2".to_string();
    b.properties_json = json!({"environment": "dev", "session": "s1"}).to_string();

    let (normalized, keys) = normalize_page(&[a, b], &pricing());
    assert_eq!(normalized.len(), 2);
    assert_eq!(keys, vec!["app", "environment", "session"]);
}

#[test]
fn one_bad_record_does_not_poison_the_page() {
    let mut bad = raw_record();
    bad.request_body = "garbage".to_string();
    bad.response_body = "garbage".to_string();
    let good = raw_record();

    let (normalized, _) = normalize_page(&[bad, good], &pricing());
    assert_eq!(normalized.len(), 2);
    assert_eq!(normalized[1].response_text, "hi");
}
