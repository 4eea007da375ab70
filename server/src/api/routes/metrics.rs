//! Time-series metric endpoints
//!
//! `POST /api/v1/metrics/{metric}/over-time` with a camelCase body
//! `{filter, timeFilter: {start, end}, dbIncrement?, timeZoneDifference}`.
//! Responses use the `{data, error}` envelope: validation failures are 400,
//! upstream query failures are 500 with the message passed through.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::extractors::{OrgScope, ValidatedJson};
use crate::api::types::{ApiError, DataResponse, parse_timestamp};
use crate::data::clickhouse::ClickhouseService;
use crate::data::clickhouse::repositories::over_time::{
    self, OverTimeError, OverTimeParams, TimeIncrement,
};
use crate::data::filters::FilterNode;

#[derive(Clone)]
pub struct MetricsState {
    pub analytics: Arc<ClickhouseService>,
}

pub fn routes(state: MetricsState) -> Router {
    Router::new()
        .route("/metrics/tokens/over-time", post(tokens_over_time))
        .route("/metrics/{metric}/over-time", post(metric_over_time))
        .with_state(state)
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OverTimeBody {
    #[serde(default)]
    #[schema(value_type = Object)]
    pub filter: FilterNode,
    pub time_filter: TimeFilterBody,
    pub db_increment: Option<String>,
    /// Minutes to add to UTC when truncating buckets (client timezone offset)
    #[serde(default)]
    #[validate(range(
        min = -1439,
        max = 1439,
        message = "timeZoneDifference must be within +/-1439 minutes"
    ))]
    pub time_zone_difference: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TimeFilterBody {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimePoint {
    pub time: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokensTimePoint {
    pub time: DateTime<Utc>,
    pub prompt_tokens: f64,
    pub completion_tokens: f64,
    pub total_tokens: f64,
}

#[derive(Debug, Clone, Copy)]
enum Metric {
    Requests,
    Errors,
    Costs,
    Latency,
    Users,
    Threats,
    CacheHits,
    RateLimits,
}

impl Metric {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "requests" => Some(Self::Requests),
            "errors" => Some(Self::Errors),
            "costs" => Some(Self::Costs),
            "latency" => Some(Self::Latency),
            "users" => Some(Self::Users),
            "threats" => Some(Self::Threats),
            "cache-hits" | "cacheHits" => Some(Self::CacheHits),
            "rate-limits" | "rateLimits" => Some(Self::RateLimits),
            _ => None,
        }
    }
}

fn map_error(err: OverTimeError) -> ApiError {
    match err {
        OverTimeError::Database(e) => {
            tracing::error!(error = %e, "over-time query failed");
            ApiError::internal(e.to_string())
        }
        validation => ApiError::bad_request("INVALID_QUERY", validation.to_string()),
    }
}

fn build_params(org_id: String, body: OverTimeBody) -> Result<OverTimeParams, ApiError> {
    let start = parse_timestamp("timeFilter.start", &body.time_filter.start)?;
    let end = parse_timestamp("timeFilter.end", &body.time_filter.end)?;
    let increment = match body.db_increment.as_deref() {
        Some(name) => TimeIncrement::parse(name).ok_or_else(|| {
            ApiError::bad_request("INVALID_INCREMENT", format!("invalid dbIncrement: {}", name))
        })?,
        None => TimeIncrement::Day,
    };
    Ok(OverTimeParams {
        org_id,
        filter: body.filter,
        start,
        end,
        increment,
        utc_offset_minutes: body.time_zone_difference,
    })
}

/// Single-valued metric time series
#[utoipa::path(
    post,
    path = "/api/v1/metrics/{metric}/over-time",
    tag = "metrics",
    params(("metric" = String, Path, description = "requests | errors | costs | latency | users | threats | cache-hits | rate-limits")),
    request_body = OverTimeBody,
    responses(
        (status = 200, description = "Gap-filled time series", body = inline(Vec<TimePoint>)),
        (status = 400, description = "Validation failure"),
        (status = 500, description = "Query failure")
    )
)]
pub async fn metric_over_time(
    State(state): State<MetricsState>,
    OrgScope(org_id): OrgScope,
    Path(metric): Path<String>,
    ValidatedJson(body): ValidatedJson<OverTimeBody>,
) -> Result<Json<DataResponse<Vec<TimePoint>>>, ApiError> {
    let metric = Metric::parse(&metric).ok_or_else(|| {
        ApiError::bad_request("UNKNOWN_METRIC", format!("unknown metric: {}", metric))
    })?;
    let params = build_params(org_id, body)?;

    let client = state.analytics.client();
    let points = match metric {
        Metric::Requests => over_time::requests_over_time(client, &params).await,
        Metric::Errors => over_time::errors_over_time(client, &params).await,
        Metric::Costs => over_time::costs_over_time(client, &params).await,
        Metric::Latency => over_time::latency_over_time(client, &params).await,
        Metric::Users => over_time::users_over_time(client, &params).await,
        Metric::Threats => over_time::threats_over_time(client, &params).await,
        Metric::CacheHits => over_time::cache_hits_over_time(client, &params).await,
        Metric::RateLimits => over_time::rate_limits_over_time(client, &params).await,
    }
    .map_err(map_error)?;

    Ok(Json(DataResponse::ok(
        points
            .into_iter()
            .map(|p| TimePoint {
                time: p.time,
                value: p.value,
            })
            .collect(),
    )))
}

/// Token usage time series (prompt, completion, total per bucket)
#[utoipa::path(
    post,
    path = "/api/v1/metrics/tokens/over-time",
    tag = "metrics",
    request_body = OverTimeBody,
    responses(
        (status = 200, description = "Gap-filled token series", body = inline(Vec<TokensTimePoint>)),
        (status = 400, description = "Validation failure"),
        (status = 500, description = "Query failure")
    )
)]
pub async fn tokens_over_time(
    State(state): State<MetricsState>,
    OrgScope(org_id): OrgScope,
    ValidatedJson(body): ValidatedJson<OverTimeBody>,
) -> Result<Json<DataResponse<Vec<TokensTimePoint>>>, ApiError> {
    let params = build_params(org_id, body)?;

    let points = over_time::tokens_over_time(state.analytics.client(), &params)
        .await
        .map_err(map_error)?;

    Ok(Json(DataResponse::ok(
        points
            .into_iter()
            .map(|p| TokensTimePoint {
                time: p.time,
                prompt_tokens: p.prompt_tokens,
                completion_tokens: p.completion_tokens,
                total_tokens: p.total_tokens,
            })
            .collect(),
    )))
}
