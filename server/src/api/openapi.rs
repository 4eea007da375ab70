//! OpenAPI specification and Swagger UI

use axum::http::header;
use axum::response::{Html, IntoResponse, Json};
use utoipa::OpenApi;

use crate::api::routes::{health, metrics, requests};
use crate::domain::normalize::{
    ChatMessage, Feedback, NormalizedRequest, RenderPayload, RequestStatus, StatusType,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "LlmLens API",
        version = env!("CARGO_PKG_VERSION"),
        description = "LLM observability dashboard backend"
    ),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "metrics", description = "Time-bucketed metric queries"),
        (name = "requests", description = "Normalized request queries")
    ),
    paths(
        health::health,
        metrics::metric_over_time,
        metrics::tokens_over_time,
        requests::query_requests,
        requests::count_requests,
        requests::get_request,
    ),
    components(schemas(
        health::HealthResponse,
        metrics::OverTimeBody,
        metrics::TimeFilterBody,
        metrics::TimePoint,
        metrics::TokensTimePoint,
        requests::RequestQueryBody,
        requests::RequestCountBody,
        requests::RequestPage,
        NormalizedRequest,
        RenderPayload,
        RequestStatus,
        StatusType,
        ChatMessage,
        Feedback,
    ))
)]
pub struct ApiDoc;

/// Serve the OpenAPI specification as JSON
pub async fn openapi_json() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        Json(ApiDoc::openapi()),
    )
}

/// Serve Swagger UI from CDN
pub async fn swagger_ui_html() -> Html<&'static str> {
    Html(SWAGGER_UI_HTML)
}

const SWAGGER_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>LlmLens API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        html { box-sizing: border-box; overflow-y: scroll; }
        *, *:before, *:after { box-sizing: inherit; }
        body { margin: 0; background: #fafafa; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
        window.onload = () => {
            window.ui = SwaggerUIBundle({
                url: "/api/openapi.json",
                dom_id: '#swagger-ui',
                deepLinking: true,
            });
        };
    </script>
</body>
</html>
"#;
