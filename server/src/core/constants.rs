// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display)
pub const APP_NAME: &str = "LlmLens";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "llmlens";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "llmlens.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "LLMLENS_CONFIG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "LLMLENS_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "LLMLENS_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "LLMLENS_LOG";

// =============================================================================
// Environment Variables - ClickHouse
// =============================================================================

/// Environment variable for ClickHouse HTTP URL
pub const ENV_CLICKHOUSE_URL: &str = "LLMLENS_CLICKHOUSE_URL";

/// Environment variable for ClickHouse database name
pub const ENV_CLICKHOUSE_DATABASE: &str = "LLMLENS_CLICKHOUSE_DATABASE";

/// Environment variable for ClickHouse user
pub const ENV_CLICKHOUSE_USER: &str = "LLMLENS_CLICKHOUSE_USER";

/// Environment variable for ClickHouse password
pub const ENV_CLICKHOUSE_PASSWORD: &str = "LLMLENS_CLICKHOUSE_PASSWORD";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 5620;

/// Default ClickHouse HTTP URL
pub const DEFAULT_CLICKHOUSE_URL: &str = "http://127.0.0.1:8123";

/// Default ClickHouse database
pub const DEFAULT_CLICKHOUSE_DATABASE: &str = "llmlens";

/// Request body limit for API endpoints (2 MB)
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

// =============================================================================
// Shutdown
// =============================================================================

/// Seconds to wait for background tasks during graceful shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// Request Log Protocol
// =============================================================================
//
// Sentinel status codes written by the ingestion gateway. Values < 0 are not
// HTTP statuses; their meaning is owned by the ingestion system.

/// Gateway sentinel: upstream call timed out
pub const STATUS_SENTINEL_TIMEOUT: i32 = -1;

/// Gateway sentinel: call recorded before a response arrived
pub const STATUS_SENTINEL_PENDING: i32 = -2;

/// Gateway sentinel: call cancelled after a usable response was captured
pub const STATUS_SENTINEL_CANCELLED: i32 = -3;

/// Gateway sentinel: request blocked by threat detection
pub const STATUS_SENTINEL_THREAT: i32 = -4;

/// Placeholder UUID stored in `cache_reference_id` when a request was not a
/// cache hit
pub const DEFAULT_CACHE_REFERENCE_ID: &str = "00000000-0000-0000-0000-000000000000";
