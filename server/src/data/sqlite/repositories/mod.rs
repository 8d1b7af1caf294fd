//! SQLite repositories
//!
//! Write functions take any SQLite executor so they can run standalone on the
//! pool or inside a caller's transaction. Read functions take the pool.

pub mod bot_status;
pub mod command_stats;
pub mod endpoint_status;
pub mod group_stats;
pub mod messages;
pub mod user_stats;

use serde::Serialize;
use utoipa::ToSchema;

pub use bot_status::{BotDailyRow, BotField, BotSnapshot, FieldPoint};
pub use endpoint_status::EndpointDailyRow;
pub use messages::MessageRecord;
pub use user_stats::UserActivity;

/// One entry of a top-N ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema, sqlx::FromRow)]
pub struct RankedRow {
    /// User id, group id or command name
    pub id: String,
    /// Display name where one is known
    pub label: Option<String>,
    pub count: i64,
    /// Unix seconds of the latest counted activity
    pub last_active: Option<i64>,
}
