//! User activity aggregates (daily and cumulative)

use serde::Serialize;
use sqlx::{SqliteExecutor, SqlitePool};
use utoipa::ToSchema;

use super::RankedRow;
use crate::data::sqlite::SqliteError;

/// One message's worth of user activity
#[derive(Debug, Clone, Copy)]
pub struct UserActivity<'a> {
    pub user_id: &'a str,
    pub self_id: &'a str,
    pub nickname: &'a str,
    pub role: &'a str,
    /// Unix seconds
    pub time: i64,
    /// Calendar date of `time`
    pub date: &'a str,
}

#[derive(Debug, Clone, Serialize, ToSchema, sqlx::FromRow)]
pub struct DailyUserRow {
    pub user_id: String,
    pub date: String,
    pub self_id: String,
    pub nickname: String,
    pub role: String,
    pub messages_sent: i64,
    pub last_message_timestamp: i64,
    pub first_of_day: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema, sqlx::FromRow)]
pub struct UserTotalsRow {
    pub user_id: String,
    pub self_id: String,
    pub nickname: String,
    pub role: String,
    pub total_messages_sent: i64,
    pub last_message_timestamp: i64,
    pub last_active_date: String,
    pub consecutive_message_days: i64,
}

/// Count a message on the user's row for its day
///
/// Returns the row's `first_of_day` flag after the write: `true` when this
/// call created the row.
pub async fn upsert_daily_user<'e>(
    executor: impl SqliteExecutor<'e>,
    activity: &UserActivity<'_>,
) -> Result<bool, SqliteError> {
    let first_of_day: bool = sqlx::query_scalar(
        r#"
        INSERT INTO daily_user_stats
            (user_id, date, self_id, nickname, role, messages_sent,
             last_message_timestamp, last_message_date, first_of_day)
        VALUES (?, ?, ?, ?, ?, 1, ?, ?, 1)
        ON CONFLICT(user_id, date) DO UPDATE SET
            messages_sent = messages_sent + 1,
            first_of_day = (last_message_date <> excluded.last_message_date),
            self_id = excluded.self_id,
            nickname = excluded.nickname,
            role = excluded.role,
            last_message_timestamp = excluded.last_message_timestamp,
            last_message_date = excluded.last_message_date
        RETURNING first_of_day
        "#,
    )
    .bind(activity.user_id)
    .bind(activity.date)
    .bind(activity.self_id)
    .bind(activity.nickname)
    .bind(activity.role)
    .bind(activity.time)
    .bind(activity.date)
    .fetch_one(executor)
    .await?;

    Ok(first_of_day)
}

/// Count a message on the user's lifetime row and advance the streak
///
/// `previous_date` is the calendar day before `activity.date`. The streak
/// grows only when the stored last active date is `previous_date`; any other
/// stored date, the same day included, restarts it at 1.
pub async fn upsert_user_totals<'e>(
    executor: impl SqliteExecutor<'e>,
    activity: &UserActivity<'_>,
    previous_date: &str,
) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO user_stats
            (user_id, self_id, nickname, role, total_messages_sent,
             last_message_timestamp, last_active_date, consecutive_message_days)
        VALUES (?, ?, ?, ?, 1, ?, ?, 1)
        ON CONFLICT(user_id) DO UPDATE SET
            total_messages_sent = total_messages_sent + 1,
            consecutive_message_days = CASE
                WHEN last_active_date = ? THEN consecutive_message_days + 1
                ELSE 1
            END,
            self_id = excluded.self_id,
            nickname = excluded.nickname,
            role = excluded.role,
            last_message_timestamp = excluded.last_message_timestamp,
            last_active_date = excluded.last_active_date
        "#,
    )
    .bind(activity.user_id)
    .bind(activity.self_id)
    .bind(activity.nickname)
    .bind(activity.role)
    .bind(activity.time)
    .bind(activity.date)
    .bind(previous_date)
    .execute(executor)
    .await?;

    Ok(())
}

/// Mark the user's first event of `date` as consumed
pub async fn clear_first_of_day<'e>(
    executor: impl SqliteExecutor<'e>,
    user_id: &str,
    date: &str,
) -> Result<(), SqliteError> {
    sqlx::query("UPDATE daily_user_stats SET first_of_day = 0 WHERE user_id = ? AND date = ?")
        .bind(user_id)
        .bind(date)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn get_daily_user(
    pool: &SqlitePool,
    user_id: &str,
    date: &str,
) -> Result<Option<DailyUserRow>, SqliteError> {
    let row = sqlx::query_as::<_, DailyUserRow>(
        r#"
        SELECT user_id, date, self_id, nickname, role, messages_sent,
               last_message_timestamp, first_of_day
        FROM daily_user_stats
        WHERE user_id = ? AND date = ?
        "#,
    )
    .bind(user_id)
    .bind(date)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn get_user_totals(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Option<UserTotalsRow>, SqliteError> {
    let row = sqlx::query_as::<_, UserTotalsRow>(
        r#"
        SELECT user_id, self_id, nickname, role, total_messages_sent,
               last_message_timestamp, last_active_date, consecutive_message_days
        FROM user_stats
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Most active users of a bot by lifetime message count
pub async fn top_users(
    pool: &SqlitePool,
    self_id: &str,
    rank: u32,
) -> Result<Vec<RankedRow>, SqliteError> {
    let rows = sqlx::query_as::<_, RankedRow>(
        r#"
        SELECT user_id AS id, nickname AS label, total_messages_sent AS count,
               last_message_timestamp AS last_active
        FROM user_stats
        WHERE self_id = ?
        ORDER BY total_messages_sent DESC, user_id ASC
        LIMIT ?
        "#,
    )
    .bind(self_id)
    .bind(rank)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Most active users of a bot on one day
pub async fn top_daily_users(
    pool: &SqlitePool,
    self_id: &str,
    date: &str,
    rank: u32,
) -> Result<Vec<RankedRow>, SqliteError> {
    let rows = sqlx::query_as::<_, RankedRow>(
        r#"
        SELECT user_id AS id, nickname AS label, messages_sent AS count,
               last_message_timestamp AS last_active
        FROM daily_user_stats
        WHERE self_id = ? AND date = ?
        ORDER BY messages_sent DESC, user_id ASC
        LIMIT ?
        "#,
    )
    .bind(self_id)
    .bind(date)
    .bind(rank)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
