//! Group activity aggregates (daily and cumulative)

use serde::Serialize;
use sqlx::{SqliteExecutor, SqlitePool};
use utoipa::ToSchema;

use super::RankedRow;
use crate::data::sqlite::SqliteError;

#[derive(Debug, Clone, Serialize, ToSchema, sqlx::FromRow)]
pub struct DailyGroupRow {
    pub group_id: String,
    pub date: String,
    pub self_id: String,
    pub messages_sent: i64,
    pub active_members: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema, sqlx::FromRow)]
pub struct GroupTotalsRow {
    pub group_id: String,
    pub self_id: String,
    pub total_messages_sent: i64,
    pub last_message_timestamp: i64,
    pub streak_date: Option<String>,
    pub consecutive_message_days: i64,
}

pub async fn increment_daily_messages<'e>(
    executor: impl SqliteExecutor<'e>,
    group_id: &str,
    self_id: &str,
    date: &str,
) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO daily_group_stats (group_id, date, self_id, messages_sent, active_members)
        VALUES (?, ?, ?, 1, 0)
        ON CONFLICT(group_id, date) DO UPDATE SET
            messages_sent = messages_sent + 1,
            self_id = excluded.self_id
        "#,
    )
    .bind(group_id)
    .bind(date)
    .bind(self_id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Count one more distinct member active in the group today
pub async fn increment_active_members<'e>(
    executor: impl SqliteExecutor<'e>,
    group_id: &str,
    self_id: &str,
    date: &str,
) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO daily_group_stats (group_id, date, self_id, messages_sent, active_members)
        VALUES (?, ?, ?, 0, 1)
        ON CONFLICT(group_id, date) DO UPDATE SET
            active_members = active_members + 1
        "#,
    )
    .bind(group_id)
    .bind(date)
    .bind(self_id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Count a message on the group's lifetime row
pub async fn upsert_group_totals<'e>(
    executor: impl SqliteExecutor<'e>,
    group_id: &str,
    self_id: &str,
    time: i64,
) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO group_stats
            (group_id, self_id, total_messages_sent, last_message_timestamp, consecutive_message_days)
        VALUES (?, ?, 1, ?, 0)
        ON CONFLICT(group_id) DO UPDATE SET
            total_messages_sent = total_messages_sent + 1,
            self_id = excluded.self_id,
            last_message_timestamp = excluded.last_message_timestamp
        "#,
    )
    .bind(group_id)
    .bind(self_id)
    .bind(time)
    .execute(executor)
    .await?;
    Ok(())
}

/// Advance the group's streak for `date`
///
/// Same rule as the user streak, measured against `streak_date`. Affects
/// zero rows when the group has no lifetime row yet.
pub async fn advance_group_streak<'e>(
    executor: impl SqliteExecutor<'e>,
    group_id: &str,
    date: &str,
    previous_date: &str,
) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        UPDATE group_stats SET
            consecutive_message_days = CASE
                WHEN streak_date = ?1 THEN consecutive_message_days
                WHEN streak_date = ?2 THEN consecutive_message_days + 1
                ELSE 1
            END,
            streak_date = ?1
        WHERE group_id = ?3
        "#,
    )
    .bind(date)
    .bind(previous_date)
    .bind(group_id)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn get_daily_group(
    pool: &SqlitePool,
    group_id: &str,
    date: &str,
) -> Result<Option<DailyGroupRow>, SqliteError> {
    let row = sqlx::query_as::<_, DailyGroupRow>(
        r#"
        SELECT group_id, date, self_id, messages_sent, active_members
        FROM daily_group_stats
        WHERE group_id = ? AND date = ?
        "#,
    )
    .bind(group_id)
    .bind(date)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn get_group_totals(
    pool: &SqlitePool,
    group_id: &str,
) -> Result<Option<GroupTotalsRow>, SqliteError> {
    let row = sqlx::query_as::<_, GroupTotalsRow>(
        r#"
        SELECT group_id, self_id, total_messages_sent, last_message_timestamp,
               streak_date, consecutive_message_days
        FROM group_stats
        WHERE group_id = ?
        "#,
    )
    .bind(group_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn top_groups(
    pool: &SqlitePool,
    self_id: &str,
    rank: u32,
) -> Result<Vec<RankedRow>, SqliteError> {
    let rows = sqlx::query_as::<_, RankedRow>(
        r#"
        SELECT group_id AS id, NULL AS label, total_messages_sent AS count,
               last_message_timestamp AS last_active
        FROM group_stats
        WHERE self_id = ?
        ORDER BY total_messages_sent DESC, group_id ASC
        LIMIT ?
        "#,
    )
    .bind(self_id)
    .bind(rank)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn top_daily_groups(
    pool: &SqlitePool,
    self_id: &str,
    date: &str,
    rank: u32,
) -> Result<Vec<RankedRow>, SqliteError> {
    let rows = sqlx::query_as::<_, RankedRow>(
        r#"
        SELECT group_id AS id, NULL AS label, messages_sent AS count,
               NULL AS last_active
        FROM daily_group_stats
        WHERE self_id = ? AND date = ?
        ORDER BY messages_sent DESC, group_id ASC
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
