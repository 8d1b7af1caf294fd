//! Dashboard statistics endpoints
//!
//! Read-only projections of the aggregate tables. Dates are calendar days in
//! the configured timezone; `days` windows include today.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::ToSchema;
use validator::Validate;

use crate::api::extractors::{BotPath, ValidatedQuery};
use crate::api::types::{
    ApiError, default_days, default_rank, validate_date, validate_days, validate_rank,
};
use crate::core::config::KnownBot;
use crate::data::sqlite::repositories::{
    BotDailyRow, BotField, EndpointDailyRow, FieldPoint, RankedRow, bot_status, command_stats,
    endpoint_status, group_stats, user_stats,
};
use crate::utils::time::{Calendar, format_date, window_start};

// ============================================================================
// State
// ============================================================================

#[derive(Clone)]
pub struct StatsApiState {
    pub pool: SqlitePool,
    pub calendar: Calendar,
    /// Bots listed even before their first event
    pub bots: Arc<Vec<KnownBot>>,
    /// Names of the probed endpoints
    pub endpoints: Arc<Vec<String>>,
}

impl StatsApiState {
    fn today(&self) -> String {
        format_date(self.calendar.today())
    }

    fn since(&self, days: u32) -> String {
        format_date(window_start(self.calendar.today(), days))
    }

    fn nickname(&self, self_id: &str) -> Option<String> {
        self.bots
            .iter()
            .find(|b| b.id == self_id && !b.nickname.is_empty())
            .map(|b| b.nickname.clone())
    }
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct WindowQuery {
    #[serde(default = "default_days")]
    #[validate(custom(function = "validate_days"))]
    pub days: u32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct HistoryQuery {
    #[serde(default = "default_days")]
    #[validate(custom(function = "validate_days"))]
    pub days: u32,
    pub field: BotField,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TopQuery {
    #[serde(default = "default_rank")]
    #[validate(custom(function = "validate_rank"))]
    pub rank: u32,
    /// Rank by this day's counts instead of lifetime totals
    #[validate(custom(function = "validate_date"))]
    pub date: Option<String>,
}

/// What a top-N ranking counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TopKind {
    Users,
    Groups,
    Commands,
}

/// Path segment selecting the ranking
#[derive(Debug, Deserialize)]
pub struct TopKindPath {
    pub kind: TopKind,
}

/// A bot's status for today
#[derive(Debug, Serialize, ToSchema)]
pub struct BotSummaryDto {
    pub self_id: String,
    pub nickname: Option<String>,
    pub online: bool,
    pub message_received: i64,
    pub message_sent: i64,
    pub last_message_time: i64,
    pub invites_received: i64,
    pub kicks_received: i64,
    pub daily_active_users: i64,
}

impl BotSummaryDto {
    fn from_row(row: BotDailyRow, nickname: Option<String>) -> Self {
        Self {
            self_id: row.self_id,
            nickname,
            online: row.online,
            message_received: row.message_received,
            message_sent: row.message_sent,
            last_message_time: row.last_message_time,
            invites_received: row.invites_received,
            kicks_received: row.kicks_received,
            daily_active_users: row.daily_active_users,
        }
    }

    /// A configured bot with no row today
    fn never_seen(bot: &KnownBot) -> Self {
        Self {
            self_id: bot.id.clone(),
            nickname: (!bot.nickname.is_empty()).then(|| bot.nickname.clone()),
            online: false,
            message_received: 0,
            message_sent: 0,
            last_message_time: 0,
            invites_received: 0,
            kicks_received: 0,
            daily_active_users: 0,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BotsResponse {
    pub date: String,
    pub bots: Vec<BotSummaryDto>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FieldHistoryResponse {
    pub self_id: String,
    pub field: BotField,
    /// Newest first
    pub points: Vec<FieldPoint>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BotDailyResponse {
    pub self_id: String,
    /// Newest first
    pub days: Vec<BotDailyRow>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopResponse {
    pub self_id: String,
    pub kind: TopKind,
    pub date: Option<String>,
    pub entries: Vec<RankedRow>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EndpointsResponse {
    pub since: String,
    pub endpoints: Vec<EndpointDailyRow>,
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes(
    pool: SqlitePool,
    calendar: Calendar,
    bots: Vec<KnownBot>,
    endpoints: Vec<String>,
) -> Router<()> {
    let state = StatsApiState {
        pool,
        calendar,
        bots: Arc::new(bots),
        endpoints: Arc::new(endpoints),
    };

    Router::new()
        .route("/bots", get(list_bots))
        .route("/bots/{self_id}/history", get(get_bot_history))
        .route("/bots/{self_id}/daily", get(get_bot_daily))
        .route("/bots/{self_id}/top/{kind}", get(get_top))
        .route("/endpoints", get(list_endpoints))
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// Liveness snapshot of every bot for today
#[utoipa::path(
    get,
    path = "/api/v1/stats/bots",
    tag = "stats",
    responses(
        (status = 200, description = "Today's status of every known bot", body = BotsResponse)
    )
)]
pub async fn list_bots(State(state): State<StatsApiState>) -> Result<Json<BotsResponse>, ApiError> {
    let date = state.today();
    let rows = bot_status::list_for_date(&state.pool, &date)
        .await
        .map_err(ApiError::from_sqlite)?;

    let mut by_id: HashMap<String, BotSummaryDto> = rows
        .into_iter()
        .map(|row| {
            let nickname = state.nickname(&row.self_id);
            (row.self_id.clone(), BotSummaryDto::from_row(row, nickname))
        })
        .collect();
    for bot in state.bots.iter() {
        by_id
            .entry(bot.id.clone())
            .or_insert_with(|| BotSummaryDto::never_seen(bot));
    }

    let mut bots: Vec<BotSummaryDto> = by_id.into_values().collect();
    bots.sort_by(|a, b| a.self_id.cmp(&b.self_id));

    Ok(Json(BotsResponse { date, bots }))
}

/// One status field of a bot over the last N days
#[utoipa::path(
    get,
    path = "/api/v1/stats/bots/{self_id}/history",
    tag = "stats",
    params(
        ("self_id" = String, Path, description = "Bot id"),
        ("days" = Option<u32>, Query, description = "Window length in days (1-365, default 7)"),
        ("field" = BotField, Query, description = "Status field to chart")
    ),
    responses(
        (status = 200, description = "Field values, newest first", body = FieldHistoryResponse),
        (status = 400, description = "Invalid parameters")
    )
)]
pub async fn get_bot_history(
    State(state): State<StatsApiState>,
    bot: BotPath,
    ValidatedQuery(query): ValidatedQuery<HistoryQuery>,
) -> Result<Json<FieldHistoryResponse>, ApiError> {
    let since = state.since(query.days);
    let points = bot_status::field_history(&state.pool, &bot.self_id, &since, query.field)
        .await
        .map_err(ApiError::from_sqlite)?;

    Ok(Json(FieldHistoryResponse {
        self_id: bot.self_id,
        field: query.field,
        points,
    }))
}

/// All status fields of a bot over the last N days
#[utoipa::path(
    get,
    path = "/api/v1/stats/bots/{self_id}/daily",
    tag = "stats",
    params(
        ("self_id" = String, Path, description = "Bot id"),
        ("days" = Option<u32>, Query, description = "Window length in days (1-365, default 7)")
    ),
    responses(
        (status = 200, description = "Daily rows, newest first", body = BotDailyResponse),
        (status = 400, description = "Invalid parameters")
    )
)]
pub async fn get_bot_daily(
    State(state): State<StatsApiState>,
    bot: BotPath,
    ValidatedQuery(query): ValidatedQuery<WindowQuery>,
) -> Result<Json<BotDailyResponse>, ApiError> {
    let since = state.since(query.days);
    let days = bot_status::list_for_bot(&state.pool, &bot.self_id, &since)
        .await
        .map_err(ApiError::from_sqlite)?;

    Ok(Json(BotDailyResponse {
        self_id: bot.self_id,
        days,
    }))
}

/// Top-N users, groups or commands of a bot
#[utoipa::path(
    get,
    path = "/api/v1/stats/bots/{self_id}/top/{kind}",
    tag = "stats",
    params(
        ("self_id" = String, Path, description = "Bot id"),
        ("kind" = TopKind, Path, description = "users, groups or commands"),
        ("rank" = Option<u32>, Query, description = "Number of entries (1-100, default 10)"),
        ("date" = Option<String>, Query, description = "YYYY-MM-DD; omit for lifetime totals")
    ),
    responses(
        (status = 200, description = "Ranking, highest count first", body = TopResponse),
        (status = 400, description = "Invalid parameters")
    )
)]
pub async fn get_top(
    State(state): State<StatsApiState>,
    bot: BotPath,
    Path(TopKindPath { kind }): Path<TopKindPath>,
    ValidatedQuery(query): ValidatedQuery<TopQuery>,
) -> Result<Json<TopResponse>, ApiError> {
    let pool = &state.pool;
    let self_id = bot.self_id.as_str();
    let rank = query.rank;

    let entries = match (kind, query.date.as_deref()) {
        (TopKind::Users, None) => user_stats::top_users(pool, self_id, rank).await,
        (TopKind::Users, Some(date)) => {
            user_stats::top_daily_users(pool, self_id, date, rank).await
        }
        (TopKind::Groups, None) => group_stats::top_groups(pool, self_id, rank).await,
        (TopKind::Groups, Some(date)) => {
            group_stats::top_daily_groups(pool, self_id, date, rank).await
        }
        (TopKind::Commands, None) => command_stats::top_commands(pool, self_id, rank).await,
        (TopKind::Commands, Some(date)) => {
            command_stats::top_daily_commands(pool, self_id, date, rank).await
        }
    }
    .map_err(ApiError::from_sqlite)?;

    Ok(Json(TopResponse {
        self_id: bot.self_id,
        kind,
        date: query.date,
        entries,
    }))
}

/// Probe results of every configured endpoint
#[utoipa::path(
    get,
    path = "/api/v1/stats/endpoints",
    tag = "stats",
    params(
        ("days" = Option<u32>, Query, description = "Window length in days (1-365, default 7)")
    ),
    responses(
        (status = 200, description = "Daily probe rows per endpoint", body = EndpointsResponse),
        (status = 400, description = "Invalid parameters")
    )
)]
pub async fn list_endpoints(
    State(state): State<StatsApiState>,
    ValidatedQuery(query): ValidatedQuery<WindowQuery>,
) -> Result<Json<EndpointsResponse>, ApiError> {
    let since = state.since(query.days);
    let endpoints = endpoint_status::list_since(&state.pool, &state.endpoints, &since)
        .await
        .map_err(ApiError::from_sqlite)?;

    Ok(Json(EndpointsResponse { since, endpoints }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::test_pool;
    use crate::domain::aggregate::Aggregator;
    use crate::domain::events::MessageEvent;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn known(id: &str, nickname: &str) -> KnownBot {
        KnownBot {
            id: id.to_string(),
            nickname: nickname.to_string(),
        }
    }

    async fn app(pool: SqlitePool) -> Router {
        routes(
            pool,
            Calendar::utc(),
            vec![known("10001", "Helper"), known("20002", "")],
            vec!["self".to_string()],
        )
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), 1 << 20).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    async fn send(pool: &SqlitePool, id: i64, user: i64, text: &str) {
        let event: MessageEvent = serde_json::from_value(json!({
            "post_type": "message",
            "message_type": "group",
            "time": chrono::Utc::now().timestamp(),
            "self_id": 10001,
            "message_id": id,
            "user_id": user,
            "group_id": 7,
            "raw_message": text,
            "sender": { "nickname": format!("user{user}") }
        }))
        .unwrap();
        Aggregator::new(pool.clone(), Calendar::utc())
            .apply_message(&event)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_bots_include_configured_but_unseen() {
        let pool = test_pool().await;
        send(&pool, 1, 42, "hi").await;

        let (status, body) = get_json(app(pool).await, "/bots").await;
        assert_eq!(status, StatusCode::OK);

        let bots = body["bots"].as_array().unwrap();
        assert_eq!(bots.len(), 2);
        assert_eq!(bots[0]["self_id"], "10001");
        assert_eq!(bots[0]["nickname"], "Helper");
        assert_eq!(bots[0]["online"], true);
        assert_eq!(bots[0]["daily_active_users"], 1);
        assert_eq!(bots[1]["self_id"], "20002");
        assert_eq!(bots[1]["nickname"], Value::Null);
        assert_eq!(bots[1]["online"], false);
    }

    #[tokio::test]
    async fn test_history_returns_requested_field() {
        let pool = test_pool().await;
        send(&pool, 1, 42, "hi").await;
        send(&pool, 2, 43, "hi").await;

        let (status, body) = get_json(
            app(pool).await,
            "/bots/10001/history?days=3&field=daily_active_users",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["field"], "daily_active_users");
        assert_eq!(body["points"][0]["value"], 2);
    }

    #[tokio::test]
    async fn test_daily_rows() {
        let pool = test_pool().await;
        send(&pool, 1, 42, "hi").await;

        let (status, body) = get_json(app(pool).await, "/bots/10001/daily").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["days"].as_array().unwrap().len(), 1);
        assert_eq!(body["days"][0]["daily_active_users"], 1);
    }

    #[tokio::test]
    async fn test_text_bot_ids_are_queryable() {
        let pool = test_pool().await;
        for (id, self_id) in [(1, "qq:1"), (2, "bot.1")] {
            let event: MessageEvent = serde_json::from_value(json!({
                "post_type": "message",
                "message_type": "private",
                "time": chrono::Utc::now().timestamp(),
                "self_id": self_id,
                "message_id": id,
                "user_id": 40 + id,
                "raw_message": "hi",
            }))
            .unwrap();
            Aggregator::new(pool.clone(), Calendar::utc())
                .apply_message(&event)
                .await
                .unwrap();
        }

        let app = app(pool).await;
        for self_id in ["qq:1", "bot.1"] {
            let (status, body) = get_json(app.clone(), &format!("/bots/{self_id}/daily")).await;
            assert_eq!(status, StatusCode::OK, "{self_id}");
            assert_eq!(body["days"][0]["self_id"], self_id);
            assert_eq!(body["days"][0]["daily_active_users"], 1);
        }
    }

    #[tokio::test]
    async fn test_top_lifetime_and_daily() {
        let pool = test_pool().await;
        send(&pool, 1, 42, "/roll").await;
        send(&pool, 2, 42, "/roll 3").await;
        send(&pool, 3, 43, "/help").await;

        let app = app(pool).await;
        let (status, body) = get_json(app.clone(), "/bots/10001/top/users?rank=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "users");
        assert_eq!(body["entries"].as_array().unwrap().len(), 1);
        assert_eq!(body["entries"][0]["id"], "42");
        assert_eq!(body["entries"][0]["label"], "user42");
        assert_eq!(body["entries"][0]["count"], 2);

        let today = format_date(Calendar::utc().today());
        let uri = format!("/bots/10001/top/commands?date={today}");
        let (_, body) = get_json(app.clone(), &uri).await;
        assert_eq!(body["date"], today.as_str());
        assert_eq!(body["entries"][0]["id"], "/roll");
        assert_eq!(body["entries"][0]["count"], 2);

        let (_, body) = get_json(app, "/bots/10001/top/groups").await;
        assert_eq!(body["entries"][0]["id"], "7");
        assert_eq!(body["entries"][0]["count"], 3);
    }

    #[tokio::test]
    async fn test_parameter_validation() {
        let pool = test_pool().await;
        let app = app(pool).await;

        for uri in [
            "/bots/10001/history?field=online&days=0",
            "/bots/10001/history?field=online&days=366",
            "/bots/10001/history?field=nickname",
            "/bots/10001/top/users?rank=101",
            "/bots/10001/top/users?date=10-01-2024",
            "/bots/%20/daily",
            "/endpoints?days=abc",
        ] {
            let (status, _) = get_json(app.clone(), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        }

        let (status, body) = get_json(app, "/bots/10001/top/users?rank=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_endpoints_only_configured() {
        let pool = test_pool().await;
        let today = format_date(Calendar::utc().today());
        endpoint_status::record_probe(&pool, "self", "http://x", &today, true)
            .await
            .unwrap();
        endpoint_status::record_probe(&pool, "retired", "http://y", &today, true)
            .await
            .unwrap();

        let (status, body) = get_json(app(pool).await, "/endpoints?days=1").await;
        assert_eq!(status, StatusCode::OK);
        let rows = body["endpoints"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["endpoint"], "self");
        assert_eq!(rows[0]["success_rate"], 1.0);
    }
}
