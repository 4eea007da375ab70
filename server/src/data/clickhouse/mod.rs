//! ClickHouse analytics service
//!
//! Async HTTP connection to ClickHouse with optional LZ4 compression. The
//! clickhouse crate's Client uses hyper with HTTP keep-alive internally, so a
//! single service instance is cheap to clone per request path.

pub mod error;
pub mod repositories;
pub mod schema;

pub use error::ClickhouseError;

use chrono::Utc;
use clickhouse::Client;

use crate::core::config::ClickhouseConfig;

/// ClickHouse analytics service
///
/// Handles schema bootstrap and hands out the client used by the
/// repositories.
pub struct ClickhouseService {
    client: Client,
}

impl ClickhouseService {
    /// Initialize the analytics service with a ClickHouse connection
    pub async fn init(config: &ClickhouseConfig) -> Result<Self, ClickhouseError> {
        let mut client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database);

        if let Some(ref user) = config.user {
            client = client.with_user(user);
        }
        if let Some(ref password) = config.password {
            client = client.with_password(password);
        }
        if config.compression {
            client = client.with_compression(clickhouse::Compression::Lz4);
        }

        let service = Self { client };
        service.run_migrations().await?;

        tracing::debug!(
            url = %config.url,
            database = %config.database,
            compression = %config.compression,
            "ClickhouseService initialized"
        );

        Ok(service)
    }

    /// Get the ClickHouse client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Health check - verify the connection to ClickHouse
    pub async fn health_check(&self) -> Result<(), ClickhouseError> {
        self.client
            .query("SELECT 1")
            .fetch_one::<u8>()
            .await
            .map_err(|e| ClickhouseError::Connection(format!("Health check failed: {}", e)))?;
        Ok(())
    }

    async fn run_migrations(&self) -> Result<(), ClickhouseError> {
        let table_exists: bool = self
            .client
            .query(
                "SELECT count() > 0 FROM system.tables WHERE database = currentDatabase() AND name = 'schema_version'",
            )
            .fetch_one()
            .await
            .map_err(|e| {
                ClickhouseError::Connection(format!(
                    "Failed to check schema_version table: {}. Verify ClickHouse is running and accessible.",
                    e
                ))
            })?;

        let current_version: i32 = if table_exists {
            self.client
                .query("SELECT max(version) FROM schema_version FINAL")
                .fetch_one()
                .await
                .unwrap_or(0)
        } else {
            0
        };

        if current_version >= schema::SCHEMA_VERSION {
            return Ok(());
        }

        tracing::debug!(
            from = current_version,
            to = schema::SCHEMA_VERSION,
            "Applying ClickHouse schema"
        );

        for stmt in schema::all_statements() {
            self.client.query(stmt).execute().await.map_err(|e| {
                ClickhouseError::MigrationFailed {
                    version: schema::SCHEMA_VERSION,
                    name: "bootstrap".to_string(),
                    error: e.to_string(),
                }
            })?;
        }

        self.client
            .query("INSERT INTO schema_version (id, version, applied_at, description) VALUES (1, ?, ?, ?)")
            .bind(schema::SCHEMA_VERSION)
            .bind(Utc::now().timestamp_micros())
            .bind("bootstrap")
            .execute()
            .await
            .map_err(|e| ClickhouseError::MigrationFailed {
                version: schema::SCHEMA_VERSION,
                name: "record_version".to_string(),
                error: e.to_string(),
            })?;

        Ok(())
    }
}
