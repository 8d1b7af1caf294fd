//! Probe results per endpoint and day

use serde::Serialize;
use sqlx::{SqliteExecutor, SqlitePool};
use utoipa::ToSchema;

use crate::data::sqlite::SqliteError;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema, sqlx::FromRow)]
pub struct EndpointDailyRow {
    pub endpoint: String,
    pub date: String,
    pub url: String,
    /// Outcome of the most recent probe
    pub online: bool,
    pub response_time_sum: i64,
    pub checks_performed: i64,
    pub checks_failed: i64,
    /// Share of successful checks, 0.0 to 1.0
    pub success_rate: f64,
}

/// Record one probe outcome
///
/// A success adds one unit to `response_time_sum`; latency is not measured.
pub async fn record_probe<'e>(
    executor: impl SqliteExecutor<'e>,
    endpoint: &str,
    url: &str,
    date: &str,
    success: bool,
) -> Result<(), SqliteError> {
    let (response_units, failures) = if success { (1_i64, 0_i64) } else { (0, 1) };

    sqlx::query(
        r#"
        INSERT INTO api_status
            (endpoint, date, url, online, response_time_sum, checks_performed, checks_failed)
        VALUES (?, ?, ?, ?, ?, 1, ?)
        ON CONFLICT(endpoint, date) DO UPDATE SET
            url = excluded.url,
            online = excluded.online,
            response_time_sum = response_time_sum + excluded.response_time_sum,
            checks_performed = checks_performed + 1,
            checks_failed = checks_failed + excluded.checks_failed
        "#,
    )
    .bind(endpoint)
    .bind(date)
    .bind(url)
    .bind(success)
    .bind(response_units)
    .bind(failures)
    .execute(executor)
    .await?;
    Ok(())
}

/// Rows for the given endpoints from `since` onward, newest first per endpoint
pub async fn list_since(
    pool: &SqlitePool,
    endpoints: &[String],
    since: &str,
) -> Result<Vec<EndpointDailyRow>, SqliteError> {
    if endpoints.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = endpoints.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!(
        r#"
        SELECT endpoint, date, url, online, response_time_sum, checks_performed, checks_failed,
               CASE WHEN checks_performed > 0
                    THEN CAST(checks_performed - checks_failed AS REAL) / checks_performed
                    ELSE 0.0
               END AS success_rate
        FROM api_status
        WHERE date >= ? AND endpoint IN ({})
        ORDER BY endpoint ASC, date DESC
        "#,
        placeholders
    );

    let mut query = sqlx::query_as::<_, EndpointDailyRow>(&sql).bind(since);
    for endpoint in endpoints {
        query = query.bind(endpoint);
    }
    Ok(query.fetch_all(pool).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::test_pool;

    const DAY: &str = "2024-01-10";

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_counters_follow_outcomes() {
        let pool = test_pool().await;
        for success in [true, true, false] {
            record_probe(&pool, "E1", "http://e1", DAY, success).await.unwrap();
        }

        let rows = list_since(&pool, &names(&["E1"]), DAY).await.unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.checks_performed, 3);
        assert_eq!(row.checks_failed, 1);
        assert_eq!(row.response_time_sum, 2);
        assert!(!row.online);
        assert!((row.success_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_online_reflects_latest_probe() {
        let pool = test_pool().await;
        record_probe(&pool, "E1", "http://e1", DAY, false).await.unwrap();
        record_probe(&pool, "E1", "http://e1", DAY, true).await.unwrap();

        let rows = list_since(&pool, &names(&["E1"]), DAY).await.unwrap();
        assert!(rows[0].online);
        assert_eq!(rows[0].checks_failed, 1);
    }

    #[tokio::test]
    async fn test_list_filters_endpoints_and_dates() {
        let pool = test_pool().await;
        record_probe(&pool, "E1", "http://e1", "2024-01-01", true).await.unwrap();
        record_probe(&pool, "E1", "http://e1", DAY, true).await.unwrap();
        record_probe(&pool, "E2", "http://e2", DAY, false).await.unwrap();
        record_probe(&pool, "retired", "http://old", DAY, true).await.unwrap();

        let rows = list_since(&pool, &names(&["E1", "E2"]), "2024-01-05")
            .await
            .unwrap();
        let keys: Vec<_> = rows.iter().map(|r| (r.endpoint.as_str(), r.date.as_str())).collect();
        assert_eq!(keys, [("E1", DAY), ("E2", DAY)]);
        assert_eq!(rows[1].success_rate, 0.0);

        assert!(list_since(&pool, &[], DAY).await.unwrap().is_empty());
    }
}
