//! Normalized request endpoints: paginated query, count, point lookup

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::extractors::OrgScope;
use crate::api::types::{ApiError, DataResponse};
use crate::data::clickhouse::ClickhouseService;
use crate::data::clickhouse::repositories::requests::{
    self, RequestQueryParams, RequestsError, SortDirection,
};
use crate::data::filters::{FilterError, FilterNode};
use crate::domain::normalize::{self, NormalizedRequest};
use crate::domain::pricing::PricingService;

#[derive(Clone)]
pub struct RequestsState {
    pub analytics: Arc<ClickhouseService>,
    pub pricing: Arc<PricingService>,
}

pub fn routes(state: RequestsState) -> Router {
    Router::new()
        .route("/requests/query", post(query_requests))
        .route("/requests/count", post(count_requests))
        .route("/requests/{id}", get(get_request))
        .with_state(state)
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestQueryBody {
    #[serde(default)]
    #[schema(value_type = Object)]
    pub filter: FilterNode,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub sort_direction: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestCountBody {
    #[serde(default)]
    #[schema(value_type = Object)]
    pub filter: FilterNode,
}

/// One page of normalized requests plus the distinct custom-property keys
/// seen on it, for dynamic column rendering
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestPage {
    pub requests: Vec<NormalizedRequest>,
    pub property_keys: Vec<String>,
}

fn map_requests_error(err: RequestsError) -> ApiError {
    match err {
        RequestsError::Filter(e) => filter_error(e),
        RequestsError::Database(e) => {
            tracing::error!(error = %e, "request query failed");
            ApiError::internal(e.to_string())
        }
    }
}

fn filter_error(err: FilterError) -> ApiError {
    ApiError::bad_request("INVALID_FILTER", err.to_string())
}

/// Query a page of requests
#[utoipa::path(
    post,
    path = "/api/v1/requests/query",
    tag = "requests",
    request_body = RequestQueryBody,
    responses(
        (status = 200, description = "Normalized request page", body = RequestPage),
        (status = 400, description = "Invalid filter or sort"),
        (status = 500, description = "Query failure")
    )
)]
pub async fn query_requests(
    State(state): State<RequestsState>,
    OrgScope(org_id): OrgScope,
    Json(body): Json<RequestQueryBody>,
) -> Result<Json<DataResponse<RequestPage>>, ApiError> {
    let sort = match body.sort_direction.as_deref() {
        None => SortDirection::default(),
        Some(raw) => SortDirection::parse(raw).ok_or_else(|| {
            ApiError::bad_request("INVALID_SORT", format!("invalid sortDirection: {}", raw))
        })?,
    };

    let params = RequestQueryParams {
        org_id,
        filter: body.filter,
        offset: body.offset,
        limit: body.limit,
        sort,
    };
    let rows = requests::query_requests(state.analytics.client(), &params)
        .await
        .map_err(map_requests_error)?;

    let (normalized, property_keys) = normalize::normalize_page(&rows, &state.pricing);
    Ok(Json(DataResponse::ok(RequestPage {
        requests: normalized,
        property_keys,
    })))
}

/// Count requests matching a filter
#[utoipa::path(
    post,
    path = "/api/v1/requests/count",
    tag = "requests",
    request_body = RequestCountBody,
    responses(
        (status = 200, description = "Matching row count"),
        (status = 400, description = "Invalid filter"),
        (status = 500, description = "Query failure")
    )
)]
pub async fn count_requests(
    State(state): State<RequestsState>,
    OrgScope(org_id): OrgScope,
    Json(body): Json<RequestCountBody>,
) -> Result<Json<DataResponse<u64>>, ApiError> {
    let count = requests::count_requests(state.analytics.client(), &org_id, &body.filter)
        .await
        .map_err(map_requests_error)?;
    Ok(Json(DataResponse::ok(count)))
}

/// Look up one normalized request by id
#[utoipa::path(
    get,
    path = "/api/v1/requests/{id}",
    tag = "requests",
    params(("id" = String, Path, description = "Request id")),
    responses(
        (status = 200, description = "Normalized request", body = NormalizedRequest),
        (status = 404, description = "No such request in this organization"),
        (status = 500, description = "Query failure")
    )
)]
pub async fn get_request(
    State(state): State<RequestsState>,
    OrgScope(org_id): OrgScope,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<NormalizedRequest>>, ApiError> {
    // Request ids are gateway-assigned UUIDs
    let id = Uuid::parse_str(&id)
        .map_err(|_| {
            ApiError::bad_request("INVALID_REQUEST_ID", format!("not a valid request id: {}", id))
        })?
        .to_string();

    let row = requests::get_request_by_id(state.analytics.client(), &org_id, &id)
        .await
        .map_err(map_requests_error)?
        .ok_or_else(|| ApiError::not_found("REQUEST_NOT_FOUND", format!("no request {}", id)))?;

    Ok(Json(DataResponse::ok(normalize::normalize_request(
        &row,
        &state.pricing,
    ))))
}
