//! ClickHouse schema definitions
//!
//! Three tables back the dashboard:
//! - `request_response`: one row per logged LLM request with its raw bodies
//! - `rate_limit_log`: one row per rejected request
//! - `cache_metrics`: per-request cache hit rollups
//!
//! All tables carry `organization_id` for tenant scoping and a creation-time
//! column ordered first for efficient time-range scans.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

pub fn schema_version_table() -> &'static str {
    r#"
CREATE TABLE IF NOT EXISTS schema_version (
    id UInt8,
    version Int32,
    applied_at Int64,
    description Nullable(String)
) ENGINE = ReplacingMergeTree()
ORDER BY id
"#
}

fn request_response_table() -> &'static str {
    r#"
CREATE TABLE IF NOT EXISTS request_response (
    request_id              String,
    organization_id         LowCardinality(String),
    user_id                 String DEFAULT '',
    provider                LowCardinality(String) DEFAULT '',
    model                   LowCardinality(String) DEFAULT '',
    path                    String DEFAULT '',
    target_url              String DEFAULT '',
    country_code            LowCardinality(String) DEFAULT '',
    status                  Int32 DEFAULT 0,
    latency                 Int64 DEFAULT 0,
    time_to_first_token     Int64 DEFAULT 0,
    prompt_tokens           Int64 DEFAULT 0,
    completion_tokens       Int64 DEFAULT 0,
    total_tokens            Int64 DEFAULT 0,
    prompt_cache_read_tokens  Int64 DEFAULT 0,
    prompt_cache_write_tokens Int64 DEFAULT 0,
    cost                    Float64 DEFAULT 0,
    threat                  Bool DEFAULT false,
    cache_reference_id      String DEFAULT '00000000-0000-0000-0000-000000000000',
    feedback_id             String DEFAULT '',
    feedback_rating         Int8 DEFAULT -1,
    feedback_created_at     DateTime64(6, 'UTC') DEFAULT toDateTime64(0, 6, 'UTC'),
    model_override          String DEFAULT '',
    request_body            String DEFAULT '',
    response_body           String DEFAULT '',
    properties              Map(String, String),
    request_created_at      DateTime64(6, 'UTC'),
    response_created_at     DateTime64(6, 'UTC') DEFAULT toDateTime64(0, 6, 'UTC'),
    INDEX idx_request_id request_id TYPE bloom_filter GRANULARITY 4
) ENGINE = ReplacingMergeTree()
PARTITION BY toYYYYMM(request_created_at)
ORDER BY (organization_id, request_created_at, request_id)
"#
}

fn rate_limit_log_table() -> &'static str {
    r#"
CREATE TABLE IF NOT EXISTS rate_limit_log (
    organization_id         LowCardinality(String),
    created_at              DateTime64(6, 'UTC')
) ENGINE = MergeTree()
PARTITION BY toYYYYMM(created_at)
ORDER BY (organization_id, created_at)
"#
}

fn cache_metrics_table() -> &'static str {
    r#"
CREATE TABLE IF NOT EXISTS cache_metrics (
    organization_id         LowCardinality(String),
    request_id              String,
    model                   LowCardinality(String) DEFAULT '',
    cache_hit_count         Int64 DEFAULT 0,
    saved_latency_ms        Int64 DEFAULT 0,
    saved_prompt_tokens     Int64 DEFAULT 0,
    saved_completion_tokens Int64 DEFAULT 0,
    created_at              DateTime64(6, 'UTC')
) ENGINE = ReplacingMergeTree()
PARTITION BY toYYYYMM(created_at)
ORDER BY (organization_id, created_at, request_id)
"#
}

/// All DDL statements for the current schema, in apply order
pub fn all_statements() -> Vec<&'static str> {
    vec![
        schema_version_table(),
        request_response_table(),
        rate_limit_log_table(),
        cache_metrics_table(),
    ]
}
