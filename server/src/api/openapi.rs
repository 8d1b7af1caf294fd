//! OpenAPI specification and Swagger UI

use axum::http::header;
use axum::response::{Html, IntoResponse, Json};
use utoipa::OpenApi;

use crate::api::routes::{health, stats};
use crate::data::sqlite::repositories::{
    BotDailyRow, BotField, EndpointDailyRow, FieldPoint, RankedRow,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "BotBoard API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Statistics and liveness for OneBot bots"
    ),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "stats", description = "Bot, user, group, command and endpoint statistics")
    ),
    paths(
        health::health,
        stats::list_bots,
        stats::get_bot_history,
        stats::get_bot_daily,
        stats::get_top,
        stats::list_endpoints,
    ),
    components(schemas(
        health::HealthResponse,
        stats::BotSummaryDto,
        stats::BotsResponse,
        stats::FieldHistoryResponse,
        stats::BotDailyResponse,
        stats::TopKind,
        stats::TopResponse,
        stats::EndpointsResponse,
        BotDailyRow,
        BotField,
        FieldPoint,
        RankedRow,
        EndpointDailyRow,
    ))
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
pub async fn openapi_json() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        Json(ApiDoc::openapi()),
    )
}

/// Serve Swagger UI from CDN
pub async fn swagger_ui_html() -> Html<&'static str> {
    Html(SWAGGER_UI_HTML)
}

const SWAGGER_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>BotBoard API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        html { box-sizing: border-box; overflow-y: scroll; }
        *, *:before, *:after { box-sizing: inherit; }
        body { margin: 0; background: #fafafa; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = () => {
            window.ui = SwaggerUIBundle({
                url: "/api/openapi.json",
                dom_id: '#swagger-ui',
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout",
                deepLinking: true,
                showExtensions: true,
                showCommonExtensions: true
            });
        };
    </script>
</body>
</html>"#;
