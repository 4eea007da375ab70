//! Time-bucketed metric queries
//!
//! Every dashboard chart is the same query shape: compile the caller's
//! filter, enumerate bucket boundaries client-side, and LEFT JOIN the
//! aggregated data onto the full bucket list so empty buckets come back as
//! explicit zeros instead of gaps.
//!
//! Timezone handling uses a fixed minute offset from UTC: boundaries are
//! truncated in the caller's local wall time, queried in UTC, and the output
//! bucket labels are re-shifted into local time.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, Timelike, Utc};
use clickhouse::{Client, Row};
use serde::Deserialize;
use thiserror::Error;

use crate::core::constants::STATUS_SENTINEL_CANCELLED;
use crate::data::filters::{
    BooleanOperator, FilterError, FilterNode, FilterTable, compile_with_org, time_range_filter,
};
use crate::utils::time::micros_to_datetime;

/// Largest accepted |utc offset| in minutes, exclusive
pub const MAX_UTC_OFFSET_MINUTES: i32 = 24 * 60;

/// Upper bound on buckets per query, guards minute-granularity requests over
/// long ranges
pub const MAX_BUCKETS: usize = 4000;

#[derive(Debug, Error)]
pub enum OverTimeError {
    #[error("invalid time range: start must be before end")]
    InvalidTimeRange,

    #[error("invalid utc offset: {offset} minutes (must be within +/-{MAX_UTC_OFFSET_MINUTES})")]
    InvalidOffset { offset: i32 },

    #[error("time range yields {count} buckets, maximum is {MAX_BUCKETS}")]
    TooManyBuckets { count: usize },

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Database error: {0}")]
    Database(#[from] clickhouse::error::Error),
}

/// Bucket width for a time series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeIncrement {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl TimeIncrement {
    /// Parse the wire name; `"min"` is accepted as an alias for minute
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "min" | "minute" => Some(Self::Minute),
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }

    fn interval_sql(&self) -> &'static str {
        match self {
            Self::Minute => "toIntervalMinute(1)",
            Self::Hour => "toIntervalHour(1)",
            Self::Day => "toIntervalDay(1)",
            Self::Week => "toIntervalWeek(1)",
            Self::Month => "toIntervalMonth(1)",
            Self::Year => "toIntervalYear(1)",
        }
    }

    /// Truncate a local wall-time instant down to the start of its bucket.
    /// Weeks start on Monday.
    fn truncate(&self, dt: NaiveDateTime) -> NaiveDateTime {
        let date = dt.date();
        let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0).unwrap();
        match self {
            Self::Minute => date.and_hms_opt(dt.hour(), dt.minute(), 0).unwrap(),
            Self::Hour => date.and_hms_opt(dt.hour(), 0, 0).unwrap(),
            Self::Day => midnight(date),
            Self::Week => {
                midnight(date - Duration::days(date.weekday().num_days_from_monday() as i64))
            }
            Self::Month => midnight(NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap()),
            Self::Year => midnight(NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap()),
        }
    }

    fn advance(&self, dt: NaiveDateTime) -> NaiveDateTime {
        match self {
            Self::Minute => dt + Duration::minutes(1),
            Self::Hour => dt + Duration::hours(1),
            Self::Day => dt + Duration::days(1),
            Self::Week => dt + Duration::weeks(1),
            Self::Month => dt + Months::new(1),
            Self::Year => dt + Months::new(12),
        }
    }
}

/// Shared parameters for every over-time query
#[derive(Debug, Clone)]
pub struct OverTimeParams {
    pub org_id: String,
    pub filter: FilterNode,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub increment: TimeIncrement,
    pub utc_offset_minutes: i32,
}

/// One point of a single-valued time series. `time` is the bucket start in
/// the caller's local wall time.
#[derive(Debug, Clone, PartialEq)]
pub struct OverTimePoint {
    pub time: DateTime<Utc>,
    pub value: f64,
}

/// One point of the token time series
#[derive(Debug, Clone, PartialEq)]
pub struct TokensOverTimePoint {
    pub time: DateTime<Utc>,
    pub prompt_tokens: f64,
    pub completion_tokens: f64,
    pub total_tokens: f64,
}

#[derive(Debug, Row, Deserialize)]
struct ChOverTimeRow {
    bucket: i64,
    value: f64,
}

#[derive(Debug, Row, Deserialize)]
struct ChTokensRow {
    bucket: i64,
    prompt_tokens: f64,
    completion_tokens: f64,
    total_tokens: f64,
}

/// Compute bucket start instants (UTC) for a range, truncating in the local
/// wall time implied by `offset_minutes`.
pub fn bucket_boundaries(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    increment: TimeIncrement,
    offset_minutes: i32,
) -> Result<Vec<DateTime<Utc>>, OverTimeError> {
    if start >= end {
        return Err(OverTimeError::InvalidTimeRange);
    }
    if offset_minutes.abs() >= MAX_UTC_OFFSET_MINUTES {
        return Err(OverTimeError::InvalidOffset {
            offset: offset_minutes,
        });
    }

    let offset = Duration::minutes(offset_minutes as i64);
    let local_start = start.naive_utc() + offset;
    let local_end = end.naive_utc() + offset;

    let mut buckets = Vec::new();
    let mut current = increment.truncate(local_start);
    while current <= local_end {
        buckets.push((current - offset).and_utc());
        if buckets.len() > MAX_BUCKETS {
            return Err(OverTimeError::TooManyBuckets {
                count: buckets.len(),
            });
        }
        current = increment.advance(current);
    }
    Ok(buckets)
}

/// Build the gap-filling bucket query. `value_exprs` is `(aggregate, alias)`
/// pairs evaluated per bucket; absent buckets produce 0 for every alias.
fn build_over_time_sql(
    table: FilterTable,
    buckets: &[DateTime<Utc>],
    increment: TimeIncrement,
    where_sql: &str,
    value_exprs: &[(&str, &str)],
) -> String {
    // Bucket boundaries are internal DateTime math, safe to inline
    let bucket_values: Vec<String> = buckets
        .iter()
        .map(|b| format!("fromUnixTimestamp64Micro({})", b.timestamp_micros()))
        .collect();
    let buckets_array = bucket_values.join(", ");

    let aggregates: Vec<String> = value_exprs
        .iter()
        .map(|(expr, alias)| format!("{expr} AS {alias}"))
        .collect();
    let coalesced: Vec<String> = value_exprs
        .iter()
        .map(|(_, alias)| format!("coalesce(bd.{alias}, 0) AS {alias}"))
        .collect();

    let table_name = table.as_str();
    let created = table.created_at_column();
    let interval = increment.interval_sql();

    format!(
        r#"
        WITH all_buckets AS (
            SELECT arrayJoin([{buckets_array}]) AS bucket
        ),
        bucket_ranges AS (
            SELECT
                bucket,
                bucket AS bucket_start,
                bucket + {interval} AS bucket_end
            FROM all_buckets
        ),
        bucketed_data AS (
            SELECT
                br.bucket AS bucket,
                {aggregates}
            FROM {table_name}, bucket_ranges br
            WHERE {where_sql}
              AND {table_name}.{created} >= br.bucket_start
              AND {table_name}.{created} < br.bucket_end
            GROUP BY br.bucket
        )
        SELECT
            toInt64(toUnixTimestamp64Micro(ab.bucket)) AS bucket,
            {coalesced}
        FROM all_buckets ab
        LEFT JOIN bucketed_data bd ON bd.bucket = ab.bucket
        ORDER BY bucket ASC
        "#,
        aggregates = aggregates.join(",\n                "),
        coalesced = coalesced.join(",\n            "),
    )
}

async fn fetch_value_over_time(
    client: &Client,
    params: &OverTimeParams,
    table: FilterTable,
    select_expr: &str,
    extra_predicate: Option<&str>,
) -> Result<Vec<OverTimePoint>, OverTimeError> {
    let buckets = bucket_boundaries(
        params.start,
        params.end,
        params.increment,
        params.utc_offset_minutes,
    )?;
    if buckets.is_empty() {
        return Ok(Vec::new());
    }

    let combined = FilterNode::branch(
        time_range_filter(table, params.start, params.end),
        BooleanOperator::And,
        params.filter.clone(),
    );
    let compiled = compile_with_org(&combined, &params.org_id, table)?;
    let where_sql = match extra_predicate {
        Some(pred) => format!("{} AND ({})", compiled.sql, pred),
        None => compiled.sql.clone(),
    };

    let sql = build_over_time_sql(
        table,
        &buckets,
        params.increment,
        &where_sql,
        &[(select_expr, "value")],
    );

    let rows: Vec<ChOverTimeRow> = compiled.bind_all(client.query(&sql)).fetch_all().await?;
    let offset = Duration::minutes(params.utc_offset_minutes as i64);
    Ok(rows
        .into_iter()
        .map(|r| OverTimePoint {
            time: micros_to_datetime(r.bucket) + offset,
            value: finite_or_zero(r.value),
        })
        .collect())
}

/// Float64 aggregates can come back NaN or infinite (e.g. an overflowed
/// sum); such values render as 0 rather than poisoning the series.
fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        tracing::warn!(value, "Non-finite aggregate value, treating as 0");
        0.0
    }
}

/// Error rows: HTTP errors plus sentinel statuses other than cancellation
fn error_status_predicate() -> String {
    format!(
        "(request_response.status >= 400 OR (request_response.status < 0 AND request_response.status != {}))",
        STATUS_SENTINEL_CANCELLED
    )
}

/// Request count per bucket
pub async fn requests_over_time(
    client: &Client,
    params: &OverTimeParams,
) -> Result<Vec<OverTimePoint>, OverTimeError> {
    fetch_value_over_time(
        client,
        params,
        FilterTable::RequestResponse,
        "toFloat64(count())",
        None,
    )
    .await
}

/// Errored request count per bucket
pub async fn errors_over_time(
    client: &Client,
    params: &OverTimeParams,
) -> Result<Vec<OverTimePoint>, OverTimeError> {
    fetch_value_over_time(
        client,
        params,
        FilterTable::RequestResponse,
        "toFloat64(count())",
        Some(&error_status_predicate()),
    )
    .await
}

/// Summed USD cost per bucket
pub async fn costs_over_time(
    client: &Client,
    params: &OverTimeParams,
) -> Result<Vec<OverTimePoint>, OverTimeError> {
    fetch_value_over_time(
        client,
        params,
        FilterTable::RequestResponse,
        "sum(request_response.cost)",
        None,
    )
    .await
}

/// Mean latency in milliseconds per bucket
pub async fn latency_over_time(
    client: &Client,
    params: &OverTimeParams,
) -> Result<Vec<OverTimePoint>, OverTimeError> {
    fetch_value_over_time(
        client,
        params,
        FilterTable::RequestResponse,
        "avg(toFloat64(request_response.latency))",
        None,
    )
    .await
}

/// Distinct active users per bucket
pub async fn users_over_time(
    client: &Client,
    params: &OverTimeParams,
) -> Result<Vec<OverTimePoint>, OverTimeError> {
    fetch_value_over_time(
        client,
        params,
        FilterTable::RequestResponse,
        "toFloat64(uniq(request_response.user_id))",
        None,
    )
    .await
}

/// Flagged-threat request count per bucket
pub async fn threats_over_time(
    client: &Client,
    params: &OverTimeParams,
) -> Result<Vec<OverTimePoint>, OverTimeError> {
    fetch_value_over_time(
        client,
        params,
        FilterTable::RequestResponse,
        "toFloat64(count())",
        Some("request_response.threat = true"),
    )
    .await
}

/// Cache hit count per bucket, from the cache rollup table
pub async fn cache_hits_over_time(
    client: &Client,
    params: &OverTimeParams,
) -> Result<Vec<OverTimePoint>, OverTimeError> {
    fetch_value_over_time(
        client,
        params,
        FilterTable::CacheMetrics,
        "toFloat64(sum(cache_metrics.cache_hit_count))",
        None,
    )
    .await
}

/// Rate-limited request count per bucket
pub async fn rate_limits_over_time(
    client: &Client,
    params: &OverTimeParams,
) -> Result<Vec<OverTimePoint>, OverTimeError> {
    fetch_value_over_time(
        client,
        params,
        FilterTable::RateLimitLog,
        "toFloat64(count())",
        None,
    )
    .await
}

/// Prompt/completion/total token sums per bucket
pub async fn tokens_over_time(
    client: &Client,
    params: &OverTimeParams,
) -> Result<Vec<TokensOverTimePoint>, OverTimeError> {
    let table = FilterTable::RequestResponse;
    let buckets = bucket_boundaries(
        params.start,
        params.end,
        params.increment,
        params.utc_offset_minutes,
    )?;
    if buckets.is_empty() {
        return Ok(Vec::new());
    }

    let combined = FilterNode::branch(
        time_range_filter(table, params.start, params.end),
        BooleanOperator::And,
        params.filter.clone(),
    );
    let compiled = compile_with_org(&combined, &params.org_id, table)?;

    let sql = build_over_time_sql(
        table,
        &buckets,
        params.increment,
        &compiled.sql,
        &[
            (
                "toFloat64(sum(request_response.prompt_tokens))",
                "prompt_tokens",
            ),
            (
                "toFloat64(sum(request_response.completion_tokens))",
                "completion_tokens",
            ),
            (
                "toFloat64(sum(request_response.total_tokens))",
                "total_tokens",
            ),
        ],
    );

    let rows: Vec<ChTokensRow> = compiled.bind_all(client.query(&sql)).fetch_all().await?;
    let offset = Duration::minutes(params.utc_offset_minutes as i64);
    Ok(rows
        .into_iter()
        .map(|r| TokensOverTimePoint {
            time: micros_to_datetime(r.bucket) + offset,
            prompt_tokens: finite_or_zero(r.prompt_tokens),
            completion_tokens: finite_or_zero(r.completion_tokens),
            total_tokens: finite_or_zero(r.total_tokens),
        })
        .collect())
}
