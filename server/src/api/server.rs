//! API server initialization

use std::net::SocketAddr;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::openapi::{openapi_json, swagger_ui_html};
use super::routes::health;
use super::routes::metrics::{self, MetricsState};
use super::routes::requests::{self, RequestsState};
use crate::app::CoreApp;
use crate::core::constants::DEFAULT_BODY_LIMIT;

pub struct ApiServer {
    app: CoreApp,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        Self { app }
    }

    /// Serve until shutdown is triggered; returns the CoreApp for teardown
    pub async fn start(self) -> Result<CoreApp> {
        let app = self.app;
        let shutdown = app.shutdown.clone();

        let addr = SocketAddr::new(
            app.config.server.host.parse()?,
            app.config.server.port,
        );

        let api = Router::new()
            .route("/health", get(health::health))
            .merge(metrics::routes(MetricsState {
                analytics: app.analytics.clone(),
            }))
            .merge(requests::routes(RequestsState {
                analytics: app.analytics.clone(),
                pricing: app.pricing.clone(),
            }));

        let router = Router::new()
            .nest("/api/v1", api)
            .route("/api/openapi.json", get(openapi_json))
            .route("/api/docs", get(swagger_ui_html))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .layer(CompressionLayer::new())
            .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT));

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("API server listening on http://{}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        Ok(app)
    }
}
