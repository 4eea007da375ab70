//! Raw request row queries: paginated listing, counting, point lookup

use clickhouse::Client;
use thiserror::Error;

use crate::data::filters::{FilterError, FilterNode, FilterTable, compile_with_org};
use crate::data::types::{RAW_REQUEST_COLUMNS, RawLoggedRequest};

/// Page size used when the caller does not specify one
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Hard cap on rows per page
pub const MAX_PAGE_SIZE: u64 = 1000;

#[derive(Debug, Error)]
pub enum RequestsError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Database error: {0}")]
    Database(#[from] clickhouse::error::Error),
}

/// Sort direction over `request_created_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestQueryParams {
    pub org_id: String,
    pub filter: FilterNode,
    pub offset: u64,
    pub limit: u64,
    pub sort: SortDirection,
}

fn effective_limit(limit: u64) -> u64 {
    if limit == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        limit.min(MAX_PAGE_SIZE)
    }
}

/// Fetch one page of raw request rows matching the filter.
///
/// `request_id` is a tiebreak sort key so pagination stays stable when many
/// rows share a creation timestamp.
pub async fn query_requests(
    client: &Client,
    params: &RequestQueryParams,
) -> Result<Vec<RawLoggedRequest>, RequestsError> {
    let table = FilterTable::RequestResponse;
    let compiled = compile_with_org(&params.filter, &params.org_id, table)?;

    let sql = format!(
        "SELECT {RAW_REQUEST_COLUMNS} \
         FROM request_response \
         WHERE {} \
         ORDER BY request_response.request_created_at {}, request_response.request_id ASC \
         LIMIT ? OFFSET ?",
        compiled.sql,
        params.sort.as_sql(),
    );

    let rows = compiled
        .bind_all(client.query(&sql))
        .bind(effective_limit(params.limit))
        .bind(params.offset)
        .fetch_all()
        .await?;
    Ok(rows)
}

/// Count rows matching the filter
pub async fn count_requests(
    client: &Client,
    org_id: &str,
    filter: &FilterNode,
) -> Result<u64, RequestsError> {
    let table = FilterTable::RequestResponse;
    let compiled = compile_with_org(filter, org_id, table)?;

    let sql = format!("SELECT count() FROM request_response WHERE {}", compiled.sql);
    let count = compiled.bind_all(client.query(&sql)).fetch_one().await?;
    Ok(count)
}

/// Look up a single request by id within the organization
pub async fn get_request_by_id(
    client: &Client,
    org_id: &str,
    request_id: &str,
) -> Result<Option<RawLoggedRequest>, RequestsError> {
    let table = FilterTable::RequestResponse;
    let compiled = compile_with_org(&FilterNode::All, org_id, table)?;

    let sql = format!(
        "SELECT {RAW_REQUEST_COLUMNS} \
         FROM request_response \
         WHERE {} AND request_response.request_id = ? \
         LIMIT 1",
        compiled.sql,
    );

    let row = compiled
        .bind_all(client.query(&sql))
        .bind(request_id)
        .fetch_optional()
        .await?;
    Ok(row)
}
