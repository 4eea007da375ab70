//! ClickHouse error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClickhouseError {
    #[error("Database error: {0}")]
    Database(#[from] clickhouse::error::Error),

    #[error("Migration {version} ({name}) failed: {error}")]
    MigrationFailed {
        version: i32,
        name: String,
        error: String,
    },

    #[error("Connection error: {0}")]
    Connection(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_failure_names_the_migration() {
        let err = ClickhouseError::MigrationFailed {
            version: 3,
            name: "add_cache_metrics".to_string(),
            error: "syntax error".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("Migration 3"));
        assert!(rendered.contains("add_cache_metrics"));
        assert!(rendered.contains("syntax error"));
    }

    #[test]
    fn connection_error_carries_detail() {
        let err = ClickhouseError::Connection("connection refused".to_string());
        assert_eq!(err.to_string(), "Connection error: connection refused");
    }
}
