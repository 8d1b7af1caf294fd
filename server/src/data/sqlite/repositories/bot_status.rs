//! Per-bot daily status rows
//!
//! Three writers share these rows. Meta snapshots own the online flag and
//! the bot-reported counters, the message path owns `daily_active_users`,
//! and notices own the invite/kick counters. Each writer only touches its
//! own columns, so one never erases another's work.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteExecutor, SqlitePool};
use utoipa::ToSchema;

use crate::data::sqlite::SqliteError;

/// Counters a bot reports about itself in a heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BotSnapshot {
    pub online: bool,
    pub message_received: i64,
    pub message_sent: i64,
    pub last_message_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema, sqlx::FromRow)]
pub struct BotDailyRow {
    pub self_id: String,
    pub date: String,
    pub online: bool,
    pub message_received: i64,
    pub message_sent: i64,
    pub last_message_time: i64,
    pub invites_received: i64,
    pub kicks_received: i64,
    pub daily_active_users: i64,
}

/// A single bot status column, selectable for history charts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BotField {
    Online,
    MessageReceived,
    MessageSent,
    LastMessageTime,
    InvitesReceived,
    KicksReceived,
    DailyActiveUsers,
}

impl BotField {
    pub const fn column(&self) -> &'static str {
        match self {
            BotField::Online => "online",
            BotField::MessageReceived => "message_received",
            BotField::MessageSent => "message_sent",
            BotField::LastMessageTime => "last_message_time",
            BotField::InvitesReceived => "invites_received",
            BotField::KicksReceived => "kicks_received",
            BotField::DailyActiveUsers => "daily_active_users",
        }
    }
}

/// One day's value of a [`BotField`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema, sqlx::FromRow)]
pub struct FieldPoint {
    pub date: String,
    pub value: i64,
}

const ROW_COLUMNS: &str = "self_id, date, online, message_received, message_sent, \
     last_message_time, invites_received, kicks_received, daily_active_users";

/// Write a heartbeat snapshot, leaving counters owned by other writers alone
pub async fn upsert_snapshot<'e>(
    executor: impl SqliteExecutor<'e>,
    self_id: &str,
    date: &str,
    snapshot: &BotSnapshot,
) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO robot_status
            (self_id, date, online, message_received, message_sent, last_message_time)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(self_id, date) DO UPDATE SET
            online = excluded.online,
            message_received = excluded.message_received,
            message_sent = excluded.message_sent,
            last_message_time = excluded.last_message_time
        "#,
    )
    .bind(self_id)
    .bind(date)
    .bind(snapshot.online)
    .bind(snapshot.message_received)
    .bind(snapshot.message_sent)
    .bind(snapshot.last_message_time)
    .execute(executor)
    .await?;
    Ok(())
}

/// Set only the online flag, creating the day's row if needed
pub async fn set_online<'e>(
    executor: impl SqliteExecutor<'e>,
    self_id: &str,
    date: &str,
    online: bool,
) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO robot_status (self_id, date, online)
        VALUES (?, ?, ?)
        ON CONFLICT(self_id, date) DO UPDATE SET online = excluded.online
        "#,
    )
    .bind(self_id)
    .bind(date)
    .bind(online)
    .execute(executor)
    .await?;
    Ok(())
}

/// Flip an existing day row offline; a bot with no row for `date` is left alone
///
/// Returns the number of rows touched.
pub async fn mark_offline<'e>(
    executor: impl SqliteExecutor<'e>,
    self_id: &str,
    date: &str,
) -> Result<u64, SqliteError> {
    let result = sqlx::query("UPDATE robot_status SET online = 0 WHERE self_id = ? AND date = ?")
        .bind(self_id)
        .bind(date)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Count a newly active user; a bot with no row yet starts online with one user
pub async fn record_active_user<'e>(
    executor: impl SqliteExecutor<'e>,
    self_id: &str,
    date: &str,
    time: i64,
) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO robot_status (self_id, date, online, last_message_time, daily_active_users)
        VALUES (?, ?, 1, ?, 1)
        ON CONFLICT(self_id, date) DO UPDATE SET
            daily_active_users = daily_active_users + 1,
            last_message_time = excluded.last_message_time
        "#,
    )
    .bind(self_id)
    .bind(date)
    .bind(time)
    .execute(executor)
    .await?;
    Ok(())
}

/// Returns the number of rows touched (0 when the bot has no row for `date`)
pub async fn increment_invites<'e>(
    executor: impl SqliteExecutor<'e>,
    self_id: &str,
    date: &str,
) -> Result<u64, SqliteError> {
    let result = sqlx::query(
        "UPDATE robot_status SET invites_received = invites_received + 1 WHERE self_id = ? AND date = ?",
    )
    .bind(self_id)
    .bind(date)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Returns the number of rows touched (0 when the bot has no row for `date`)
pub async fn increment_kicks<'e>(
    executor: impl SqliteExecutor<'e>,
    self_id: &str,
    date: &str,
) -> Result<u64, SqliteError> {
    let result = sqlx::query(
        "UPDATE robot_status SET kicks_received = kicks_received + 1 WHERE self_id = ? AND date = ?",
    )
    .bind(self_id)
    .bind(date)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn get_bot_day(
    pool: &SqlitePool,
    self_id: &str,
    date: &str,
) -> Result<Option<BotDailyRow>, SqliteError> {
    let sql = format!(
        "SELECT {} FROM robot_status WHERE self_id = ? AND date = ?",
        ROW_COLUMNS
    );
    let row = sqlx::query_as::<_, BotDailyRow>(&sql)
        .bind(self_id)
        .bind(date)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Every bot's row for one day
pub async fn list_for_date(pool: &SqlitePool, date: &str) -> Result<Vec<BotDailyRow>, SqliteError> {
    let sql = format!(
        "SELECT {} FROM robot_status WHERE date = ? ORDER BY self_id",
        ROW_COLUMNS
    );
    let rows = sqlx::query_as::<_, BotDailyRow>(&sql)
        .bind(date)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// One bot's rows from `since` onward, newest first
pub async fn list_for_bot(
    pool: &SqlitePool,
    self_id: &str,
    since: &str,
) -> Result<Vec<BotDailyRow>, SqliteError> {
    let sql = format!(
        "SELECT {} FROM robot_status WHERE self_id = ? AND date >= ? ORDER BY date DESC",
        ROW_COLUMNS
    );
    let rows = sqlx::query_as::<_, BotDailyRow>(&sql)
        .bind(self_id)
        .bind(since)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// One column of a bot's rows from `since` onward, newest first
pub async fn field_history(
    pool: &SqlitePool,
    self_id: &str,
    since: &str,
    field: BotField,
) -> Result<Vec<FieldPoint>, SqliteError> {
    // Column names come from a closed enum, never from the request
    let sql = format!(
        "SELECT date, CAST({} AS INTEGER) AS value FROM robot_status \
         WHERE self_id = ? AND date >= ? ORDER BY date DESC",
        field.column()
    );
    let rows = sqlx::query_as::<_, FieldPoint>(&sql)
        .bind(self_id)
        .bind(since)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
