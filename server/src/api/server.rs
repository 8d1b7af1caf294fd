//! API server initialization

use std::net::SocketAddr;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::compression::CompressionLayer;

use super::middleware::{self, AllowedOrigins};
use super::openapi::{openapi_json, swagger_ui_html};
use super::routes::ingest::{self, IngestState};
use super::routes::{health, stats};
use crate::core::CoreApp;
use crate::core::config::AppConfig;
use crate::core::constants::DEFAULT_BODY_LIMIT;
use crate::data::sqlite::SqlitePool;
use crate::domain::Dispatcher;

/// Assemble the full router: dashboard API, docs and the bot socket
///
/// The HTTP layers wrap the dashboard routes only. The ingest route is merged
/// afterwards so upgrade responses pass through untouched.
pub fn build_router(
    config: &AppConfig,
    pool: SqlitePool,
    dispatcher: Dispatcher,
    shutdown_rx: watch::Receiver<bool>,
) -> Router {
    let allowed_origins = AllowedOrigins::new(&config.server.host, config.server.port);

    let stats_routes = stats::routes(
        pool.clone(),
        config.calendar,
        config.bots.clone(),
        config
            .probes
            .endpoints
            .iter()
            .map(|e| e.name.clone())
            .collect(),
    );

    let api = Router::new()
        .route("/api/v1/health", get(health::health).with_state(pool))
        .route("/api/openapi.json", get(openapi_json))
        .route("/api/docs", get(swagger_ui_html))
        .route("/api/docs/", get(swagger_ui_html))
        .nest("/api/v1/stats", stats_routes)
        .fallback(middleware::handle_404)
        .layer(CompressionLayer::new())
        .layer(middleware::cors(&allowed_origins))
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT));

    let ingest_routes = ingest::routes(
        &config.ingest.path,
        IngestState {
            dispatcher,
            token: config.ingest.token.clone(),
            shutdown: shutdown_rx,
        },
    );

    api.merge(ingest_routes)
}

pub struct ApiServer {
    app: CoreApp,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        Self { app }
    }

    /// Returns CoreApp for graceful shutdown
    pub async fn start(self) -> Result<CoreApp> {
        let Self { app } = self;

        let shutdown = app.shutdown.clone();
        let addr = SocketAddr::new(app.config.server.host.parse()?, app.config.server.port);

        let router = build_router(
            &app.config,
            app.database.pool().clone(),
            app.dispatcher.clone(),
            shutdown.subscribe(),
        );

        let listener = TcpListener::bind(addr).await?;
        tracing::debug!(addr = %addr, "HTTP server listening");
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.wait())
        .await?;

        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cli::CliConfig;
    use crate::core::config::FileConfig;
    use crate::data::sqlite::test_pool;
    use crate::domain::aggregate::Aggregator;
    use crate::domain::liveness::LivenessHandle;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn router(ingest_path: &str) -> Router {
        let cli = CliConfig {
            ingest_path: Some(ingest_path.to_string()),
            ..Default::default()
        };
        let config = AppConfig::from_layers(&cli, FileConfig::default()).unwrap();
        let pool = test_pool().await;
        let (liveness, _touches) = LivenessHandle::channel(8);
        let aggregator = Aggregator::new(pool.clone(), config.calendar);
        let dispatcher = Dispatcher::new(aggregator, liveness, false);
        let (_tx, rx) = watch::channel(false);
        build_router(&config, pool, dispatcher, rx)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Option<Value>) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).ok())
    }

    #[tokio::test]
    async fn test_health_and_openapi_mounted() {
        let app = router("/ws").await;

        let (status, body) = get_json(app.clone(), "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.unwrap()["database"], "ok");

        let (status, body) = get_json(app, "/api/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        let body = body.unwrap();
        assert_eq!(body["info"]["title"], "BotBoard API");
        assert!(body["paths"]["/api/v1/stats/bots"].is_object());
    }

    #[tokio::test]
    async fn test_stats_nested_and_unknown_routes_404() {
        let app = router("/ws").await;

        let (status, body) = get_json(app.clone(), "/api/v1/stats/bots").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.unwrap()["bots"].is_array());

        let (status, _) = get_json(app, "/api/v1/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_plain_get_on_ingest_path_is_not_an_upgrade() {
        let app = router("/ws").await;
        let (status, _) = get_json(app, "/ws").await;
        assert!(status.is_client_error());
        assert_ne!(status, StatusCode::NOT_FOUND);
    }
}
