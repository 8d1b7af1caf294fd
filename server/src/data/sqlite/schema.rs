//! SQLite schema definitions
//!
//! Every identifier column is TEXT: bot, user, group and message ids arrive
//! as either numbers or strings and are normalised to their decimal string
//! form before they reach the store. Dates are `YYYY-MM-DD` in the configured
//! calendar; timestamps are unix seconds.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Complete schema SQL (fresh databases start at [`SCHEMA_VERSION`])
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at INTEGER NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms INTEGER,
    success INTEGER NOT NULL DEFAULT 1
);

-- =============================================================================
-- 1. Raw message log (overwrite by message id)
-- =============================================================================
CREATE TABLE IF NOT EXISTS messages (
    message_id TEXT PRIMARY KEY,
    message_type TEXT NOT NULL,
    time INTEGER NOT NULL,
    self_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    group_id TEXT NOT NULL DEFAULT '',
    raw_message TEXT NOT NULL,
    message_date TEXT NOT NULL
);

-- =============================================================================
-- 2. Bot status (daily)
-- =============================================================================
CREATE TABLE IF NOT EXISTS robot_status (
    self_id TEXT NOT NULL,
    date TEXT NOT NULL,
    online INTEGER NOT NULL DEFAULT 0,
    message_received INTEGER NOT NULL DEFAULT 0,
    message_sent INTEGER NOT NULL DEFAULT 0,
    last_message_time INTEGER NOT NULL DEFAULT 0,
    invites_received INTEGER NOT NULL DEFAULT 0,
    kicks_received INTEGER NOT NULL DEFAULT 0,
    daily_active_users INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (self_id, date)
);

-- =============================================================================
-- 3. User stats (daily + cumulative)
-- =============================================================================
CREATE TABLE IF NOT EXISTS daily_user_stats (
    user_id TEXT NOT NULL,
    date TEXT NOT NULL,
    self_id TEXT NOT NULL,
    nickname TEXT NOT NULL DEFAULT '',
    role TEXT NOT NULL DEFAULT '',
    messages_sent INTEGER NOT NULL DEFAULT 0,
    last_message_timestamp INTEGER NOT NULL,
    last_message_date TEXT NOT NULL,
    first_of_day INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (user_id, date)
);

CREATE TABLE IF NOT EXISTS user_stats (
    user_id TEXT PRIMARY KEY,
    self_id TEXT NOT NULL,
    nickname TEXT NOT NULL DEFAULT '',
    role TEXT NOT NULL DEFAULT '',
    total_messages_sent INTEGER NOT NULL DEFAULT 0,
    last_message_timestamp INTEGER NOT NULL,
    last_active_date TEXT NOT NULL,
    consecutive_message_days INTEGER NOT NULL DEFAULT 1
);

-- =============================================================================
-- 4. Group stats (daily + cumulative)
-- =============================================================================
CREATE TABLE IF NOT EXISTS daily_group_stats (
    group_id TEXT NOT NULL,
    date TEXT NOT NULL,
    self_id TEXT NOT NULL,
    messages_sent INTEGER NOT NULL DEFAULT 0,
    active_members INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (group_id, date)
);

-- streak_date is the last day the streak counted, kept apart from the
-- activity timestamp that every message overwrites
CREATE TABLE IF NOT EXISTS group_stats (
    group_id TEXT PRIMARY KEY,
    self_id TEXT NOT NULL,
    total_messages_sent INTEGER NOT NULL DEFAULT 0,
    last_message_timestamp INTEGER NOT NULL,
    streak_date TEXT,
    consecutive_message_days INTEGER NOT NULL DEFAULT 0
);

-- =============================================================================
-- 5. Command stats (daily + cumulative)
-- =============================================================================
CREATE TABLE IF NOT EXISTS command_stats (
    command_name TEXT NOT NULL,
    self_id TEXT NOT NULL,
    total_calls INTEGER NOT NULL DEFAULT 0,
    last_call_timestamp INTEGER NOT NULL,
    PRIMARY KEY (command_name, self_id)
);

CREATE TABLE IF NOT EXISTS daily_command_stats (
    command_name TEXT NOT NULL,
    self_id TEXT NOT NULL,
    date TEXT NOT NULL,
    calls INTEGER NOT NULL DEFAULT 0,
    last_call_timestamp INTEGER NOT NULL,
    PRIMARY KEY (command_name, self_id, date)
);

-- =============================================================================
-- 6. Endpoint health (daily)
-- =============================================================================
CREATE TABLE IF NOT EXISTS api_status (
    endpoint TEXT NOT NULL,
    date TEXT NOT NULL,
    url TEXT NOT NULL,
    online INTEGER NOT NULL DEFAULT 0,
    response_time_sum INTEGER NOT NULL DEFAULT 0,
    checks_performed INTEGER NOT NULL DEFAULT 0,
    checks_failed INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (endpoint, date)
);

-- =============================================================================
-- Ranking indexes (v2)
-- =============================================================================
CREATE INDEX IF NOT EXISTS idx_user_stats_self_total ON user_stats(self_id, total_messages_sent DESC);
CREATE INDEX IF NOT EXISTS idx_daily_user_stats_self_date ON daily_user_stats(self_id, date);
CREATE INDEX IF NOT EXISTS idx_group_stats_self_total ON group_stats(self_id, total_messages_sent DESC);
CREATE INDEX IF NOT EXISTS idx_daily_group_stats_self_date ON daily_group_stats(self_id, date);
CREATE INDEX IF NOT EXISTS idx_daily_command_stats_self_date ON daily_command_stats(self_id, date);
"#;

/// Version 2: indexes backing the dashboard top-N queries
pub const MIGRATION_V2_RANKING_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_user_stats_self_total ON user_stats(self_id, total_messages_sent DESC);
CREATE INDEX IF NOT EXISTS idx_daily_user_stats_self_date ON daily_user_stats(self_id, date);
CREATE INDEX IF NOT EXISTS idx_group_stats_self_total ON group_stats(self_id, total_messages_sent DESC);
CREATE INDEX IF NOT EXISTS idx_daily_group_stats_self_date ON daily_group_stats(self_id, date);
CREATE INDEX IF NOT EXISTS idx_daily_command_stats_self_date ON daily_command_stats(self_id, date);
"#;
