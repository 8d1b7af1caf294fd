//! Raw message log

use serde::Serialize;
use sqlx::{SqliteExecutor, SqlitePool};
use utoipa::ToSchema;

use crate::data::sqlite::SqliteError;

/// A message as written to the log
#[derive(Debug, Clone, Copy)]
pub struct MessageRecord<'a> {
    pub message_id: &'a str,
    pub message_type: &'a str,
    pub time: i64,
    pub self_id: &'a str,
    pub user_id: &'a str,
    /// Empty for private messages
    pub group_id: &'a str,
    pub raw_message: &'a str,
    pub date: &'a str,
}

#[derive(Debug, Clone, Serialize, ToSchema, sqlx::FromRow)]
pub struct MessageRow {
    pub message_id: String,
    pub message_type: String,
    pub time: i64,
    pub self_id: String,
    pub user_id: String,
    pub group_id: String,
    pub raw_message: String,
    pub message_date: String,
}

/// Write a message, replacing any earlier copy with the same id
pub async fn upsert_message<'e>(
    executor: impl SqliteExecutor<'e>,
    record: &MessageRecord<'_>,
) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO messages
            (message_id, message_type, time, self_id, user_id, group_id, raw_message, message_date)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(message_id) DO UPDATE SET
            message_type = excluded.message_type,
            time = excluded.time,
            self_id = excluded.self_id,
            user_id = excluded.user_id,
            group_id = excluded.group_id,
            raw_message = excluded.raw_message,
            message_date = excluded.message_date
        "#,
    )
    .bind(record.message_id)
    .bind(record.message_type)
    .bind(record.time)
    .bind(record.self_id)
    .bind(record.user_id)
    .bind(record.group_id)
    .bind(record.raw_message)
    .bind(record.date)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn get_message(
    pool: &SqlitePool,
    message_id: &str,
) -> Result<Option<MessageRow>, SqliteError> {
    let row = sqlx::query_as::<_, MessageRow>(
        r#"
        SELECT message_id, message_type, time, self_id, user_id, group_id,
               raw_message, message_date
        FROM messages
        WHERE message_id = ?
        "#,
    )
    .bind(message_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn count_messages(pool: &SqlitePool) -> Result<i64, SqliteError> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::test_pool;

    #[tokio::test]
    async fn test_replay_overwrites_by_id() {
        let pool = test_pool().await;
        let first = MessageRecord {
            message_id: "m-1",
            message_type: "group",
            time: 100,
            self_id: "B1",
            user_id: "U1",
            group_id: "G1",
            raw_message: "/roll d20",
            date: "2024-01-10",
        };
        upsert_message(&pool, &first).await.unwrap();
        upsert_message(
            &pool,
            &MessageRecord {
                raw_message: "/roll d6",
                time: 101,
                ..first
            },
        )
        .await
        .unwrap();

        assert_eq!(count_messages(&pool).await.unwrap(), 1);
        let row = get_message(&pool, "m-1").await.unwrap().unwrap();
        assert_eq!(row.raw_message, "/roll d6");
        assert_eq!(row.time, 101);
        assert_eq!(row.message_date, "2024-01-10");
    }
}
