// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and platform directories)
pub const APP_NAME: &str = "BotBoard";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "botboard";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".botboard";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "botboard.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "BOTBOARD_CONFIG";

// =============================================================================
// Environment Variables
// =============================================================================

pub const ENV_DEBUG: &str = "BOTBOARD_DEBUG";
pub const ENV_HOST: &str = "BOTBOARD_HOST";
pub const ENV_PORT: &str = "BOTBOARD_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "BOTBOARD_LOG";

/// Environment variable to override data directory
pub const ENV_DATA_DIR: &str = "BOTBOARD_DATA_DIR";

/// Shared secret bot clients must present on the ingest socket
pub const ENV_INGEST_TOKEN: &str = "BOTBOARD_INGEST_TOKEN";

pub const ENV_INGEST_PATH: &str = "BOTBOARD_INGEST_PATH";
pub const ENV_TIMEZONE: &str = "BOTBOARD_TIMEZONE";

// =============================================================================
// Server Defaults
// =============================================================================

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 18630;

/// Ingest socket is mounted at the root unless configured otherwise
pub const DEFAULT_INGEST_PATH: &str = "/";

/// Maximum HTTP request body size
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Upper bound on waiting for background tasks at shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Ingest Connection
// =============================================================================

/// Header a bot client may send to identify itself before the first event
pub const HEADER_SELF_ID: &str = "x-self-id";

/// Query parameter fallback for the ingest token
pub const INGEST_TOKEN_QUERY_PARAM: &str = "access_token";

// =============================================================================
// Liveness
// =============================================================================

/// How often the last-seen table is swept
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

/// A bot silent for longer than this is marked offline
pub const DEFAULT_LIVENESS_TIMEOUT_SECS: u64 = 60;

/// Buffer for liveness touches between the dispatcher and the sweep task
pub const LIVENESS_CHANNEL_CAPACITY: usize = 1024;

// =============================================================================
// Endpoint Probes
// =============================================================================

pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;

/// Name of the default probe target
pub const DEFAULT_PROBE_NAME: &str = "self";

/// Default probe target: this server's own health route
pub const DEFAULT_PROBE_URL: &str = "http://127.0.0.1:18630/api/v1/health";

// =============================================================================
// Dashboard Queries
// =============================================================================

pub const DEFAULT_HISTORY_DAYS: u32 = 7;
pub const MAX_HISTORY_DAYS: u32 = 365;
pub const DEFAULT_TOP_RANK: u32 = 10;
pub const MAX_TOP_RANK: u32 = 100;

// =============================================================================
// SQLite Database
// =============================================================================

/// SQLite database filename
pub const SQLITE_DB_FILENAME: &str = "botboard.db";

/// SQLite connection pool max connections
pub const SQLITE_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in seconds
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

/// SQLite cache size (negative = KB, so -16000 = 16MB)
pub const SQLITE_CACHE_SIZE: &str = "-16000";

/// SQLite WAL auto-checkpoint threshold (pages)
pub const SQLITE_WAL_AUTOCHECKPOINT: &str = "1000";

/// WAL checkpoint interval in seconds (5 minutes)
pub const SQLITE_CHECKPOINT_INTERVAL_SECS: u64 = 300;
