//! Command usage counters

use sqlx::{SqliteExecutor, SqlitePool};

use super::RankedRow;
use crate::data::sqlite::SqliteError;

pub async fn upsert_command_totals<'e>(
    executor: impl SqliteExecutor<'e>,
    command_name: &str,
    self_id: &str,
    time: i64,
) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO command_stats (command_name, self_id, total_calls, last_call_timestamp)
        VALUES (?, ?, 1, ?)
        ON CONFLICT(command_name, self_id) DO UPDATE SET
            total_calls = total_calls + 1,
            last_call_timestamp = excluded.last_call_timestamp
        "#,
    )
    .bind(command_name)
    .bind(self_id)
    .bind(time)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn upsert_daily_command<'e>(
    executor: impl SqliteExecutor<'e>,
    command_name: &str,
    self_id: &str,
    date: &str,
    time: i64,
) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO daily_command_stats (command_name, self_id, date, calls, last_call_timestamp)
        VALUES (?, ?, ?, 1, ?)
        ON CONFLICT(command_name, self_id, date) DO UPDATE SET
            calls = calls + 1,
            last_call_timestamp = excluded.last_call_timestamp
        "#,
    )
    .bind(command_name)
    .bind(self_id)
    .bind(date)
    .bind(time)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn top_commands(
    pool: &SqlitePool,
    self_id: &str,
    rank: u32,
) -> Result<Vec<RankedRow>, SqliteError> {
    let rows = sqlx::query_as::<_, RankedRow>(
        r#"
        SELECT command_name AS id, NULL AS label, total_calls AS count,
               last_call_timestamp AS last_active
        FROM command_stats
        WHERE self_id = ?
        ORDER BY total_calls DESC, command_name ASC
        LIMIT ?
        "#,
    )
    .bind(self_id)
    .bind(rank)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn top_daily_commands(
    pool: &SqlitePool,
    self_id: &str,
    date: &str,
    rank: u32,
) -> Result<Vec<RankedRow>, SqliteError> {
    let rows = sqlx::query_as::<_, RankedRow>(
        r#"
        SELECT command_name AS id, NULL AS label, calls AS count,
               last_call_timestamp AS last_active
        FROM daily_command_stats
        WHERE self_id = ? AND date = ?
        ORDER BY calls DESC, command_name ASC
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::test_pool;

    #[tokio::test]
    async fn test_command_counters() {
        let pool = test_pool().await;
        for (cmd, time) in [("/help", 10), ("/roll", 20), ("/roll", 30)] {
            upsert_command_totals(&pool, cmd, "B1", time).await.unwrap();
            upsert_daily_command(&pool, cmd, "B1", "2024-01-10", time)
                .await
                .unwrap();
        }
        upsert_daily_command(&pool, "/help", "B1", "2024-01-11", 90_000)
            .await
            .unwrap();

        let top = top_commands(&pool, "B1", 10).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].id, "/roll");
        assert_eq!(top[0].count, 2);
        assert_eq!(top[0].last_active, Some(30));

        let day = top_daily_commands(&pool, "B1", "2024-01-11", 10).await.unwrap();
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].id, "/help");
        assert_eq!(day[0].count, 1);
    }

    #[tokio::test]
    async fn test_commands_are_per_bot() {
        let pool = test_pool().await;
        upsert_command_totals(&pool, "/help", "B1", 1).await.unwrap();
        upsert_command_totals(&pool, "/help", "B2", 2).await.unwrap();

        assert_eq!(top_commands(&pool, "B1", 10).await.unwrap()[0].count, 1);
        assert_eq!(top_commands(&pool, "B2", 10).await.unwrap()[0].count, 1);
    }
}
