//! Raw analytics row types

use clickhouse::Row;
use serde::Deserialize;

/// One logged request exactly as stored, before normalization.
///
/// Bodies are kept as raw JSON strings; `properties_json` is the properties
/// map serialized with `toJSONString` so the row stays a flat RowBinary
/// record. Timestamps are micros since the Unix epoch.
#[derive(Debug, Clone, Row, Deserialize)]
pub struct RawLoggedRequest {
    pub request_id: String,
    pub organization_id: String,
    pub user_id: String,
    pub provider: String,
    pub model: String,
    pub model_override: String,
    pub path: String,
    pub target_url: String,
    pub country_code: String,
    pub status: i32,
    pub latency: i64,
    pub time_to_first_token: i64,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub prompt_cache_read_tokens: i64,
    pub prompt_cache_write_tokens: i64,
    pub threat: bool,
    pub cache_reference_id: String,
    pub feedback_id: String,
    /// -1 no rating, 0 negative, 1 positive
    pub feedback_rating: i8,
    pub feedback_created_at: i64,
    pub request_body: String,
    pub response_body: String,
    pub properties_json: String,
    pub request_created_at: i64,
    pub response_created_at: i64,
}

/// SELECT list matching [`RawLoggedRequest`] field order
pub const RAW_REQUEST_COLUMNS: &str = "\
    request_response.request_id, \
    request_response.organization_id, \
    request_response.user_id, \
    request_response.provider, \
    request_response.model, \
    request_response.model_override, \
    request_response.path, \
    request_response.target_url, \
    request_response.country_code, \
    request_response.status, \
    request_response.latency, \
    request_response.time_to_first_token, \
    request_response.prompt_tokens, \
    request_response.completion_tokens, \
    request_response.total_tokens, \
    request_response.prompt_cache_read_tokens, \
    request_response.prompt_cache_write_tokens, \
    request_response.threat, \
    request_response.cache_reference_id, \
    request_response.feedback_id, \
    request_response.feedback_rating, \
    toInt64(toUnixTimestamp64Micro(request_response.feedback_created_at)) AS feedback_created_at, \
    request_response.request_body, \
    request_response.response_body, \
    toJSONString(request_response.properties) AS properties_json, \
    toInt64(toUnixTimestamp64Micro(request_response.request_created_at)) AS request_created_at, \
    toInt64(toUnixTimestamp64Micro(request_response.response_created_at)) AS response_created_at";

impl RawLoggedRequest {
    /// Effective model for pricing and display: an operator override wins
    /// over the logged model.
    pub fn effective_model(&self) -> &str {
        if self.model_override.is_empty() {
            &self.model
        } else {
            &self.model_override
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank() -> RawLoggedRequest {
        RawLoggedRequest {
            request_id: String::new(),
            organization_id: String::new(),
            user_id: String::new(),
            provider: String::new(),
            model: String::new(),
            model_override: String::new(),
            path: String::new(),
            target_url: String::new(),
            country_code: String::new(),
            status: 0,
            latency: 0,
            time_to_first_token: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            prompt_cache_read_tokens: 0,
            prompt_cache_write_tokens: 0,
            threat: false,
            cache_reference_id: String::new(),
            feedback_id: String::new(),
            feedback_rating: -1,
            feedback_created_at: 0,
            request_body: String::new(),
            response_body: String::new(),
            properties_json: String::new(),
            request_created_at: 0,
            response_created_at: 0,
        }
    }

    #[test]
    fn override_wins_over_logged_model() {
        let mut row = blank();
        row.model = "gpt-4".to_string();
        assert_eq!(row.effective_model(), "gpt-4");
        row.model_override = "gpt-4-turbo".to_string();
        assert_eq!(row.effective_model(), "gpt-4-turbo");
    }

    #[test]
    fn select_list_field_count_matches_struct() {
        // One select expression per struct field, same order
        assert_eq!(RAW_REQUEST_COLUMNS.split(',').count(), 27);
    }
}
