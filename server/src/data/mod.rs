//! Data layer: filter model, ClickHouse service, and row types

pub mod clickhouse;
pub mod filters;
pub mod types;
