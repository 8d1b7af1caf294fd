//! OneBot event socket
//!
//! Bots connect with a WebSocket and stream events. The shared token, when
//! configured, is checked before the upgrade. After the upgrade the server
//! sends one lifecycle-connect frame and then reads frames in order, handing
//! each to the dispatcher. A frame that fails never closes the connection.

use std::collections::HashMap;

use axum::{Json, Router};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::watch;

use crate::core::constants::{HEADER_SELF_ID, INGEST_TOKEN_QUERY_PARAM};
use crate::domain::events::{Dispatcher, SubjectId};
use crate::utils::crypto::constant_time_eq;

#[derive(Clone)]
pub struct IngestState {
    pub dispatcher: Dispatcher,
    pub token: Option<String>,
    pub shutdown: watch::Receiver<bool>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestAuthError {
    #[error("Missing token")]
    Missing,
    #[error("Incorrect token")]
    Incorrect,
}

impl IntoResponse for IngestAuthError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Missing => StatusCode::UNAUTHORIZED,
            Self::Incorrect => StatusCode::FORBIDDEN,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn routes(path: &str, state: IngestState) -> Router<()> {
    Router::new()
        .route(path, get(ingest_socket))
        .with_state(state)
}

/// Token from `Authorization` (`Token x`, `Bearer x` or bare), else the query
pub fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());

    let token = match from_header {
        Some(value) => value
            .strip_prefix("Token ")
            .or_else(|| value.strip_prefix("Bearer "))
            .unwrap_or(value),
        None => query_token?,
    };
    (!token.is_empty()).then(|| token.to_string())
}

pub fn authorize(expected: Option<&str>, provided: Option<&str>) -> Result<(), IngestAuthError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match provided {
        None => Err(IngestAuthError::Missing),
        Some(token) if constant_time_eq(token, expected) => Ok(()),
        Some(_) => Err(IngestAuthError::Incorrect),
    }
}

/// First frame sent on a fresh connection
pub fn connect_frame(self_id: &SubjectId, now: i64) -> Value {
    let self_id = self_id
        .as_str()
        .parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(self_id.to_string()));
    json!({
        "meta_event_type": "lifecycle",
        "post_type": "meta_event",
        "self_id": self_id,
        "sub_type": "connect",
        "time": now,
    })
}

async fn ingest_socket(
    State(state): State<IngestState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let provided = extract_token(
        &headers,
        query.get(INGEST_TOKEN_QUERY_PARAM).map(String::as_str),
    );
    if let Err(e) = authorize(state.token.as_deref(), provided.as_deref()) {
        tracing::warn!(error = %e, "Ingest connection rejected");
        return e.into_response();
    }

    let self_id = headers
        .get(HEADER_SELF_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(SubjectId::from)
        .unwrap_or_else(|| SubjectId::from(0));

    ws.on_upgrade(move |socket| run_connection(state, socket, self_id))
}

async fn run_connection(state: IngestState, socket: WebSocket, self_id: SubjectId) {
    let IngestState {
        dispatcher,
        mut shutdown,
        ..
    } = state;
    let (mut sender, mut receiver) = socket.split();

    let hello = connect_frame(&self_id, chrono::Utc::now().timestamp());
    if let Err(e) = sender.send(Message::Text(hello.to_string().into())).await {
        tracing::debug!(self_id = %self_id, error = %e, "Failed to send connect frame");
        return;
    }
    tracing::info!(self_id = %self_id, "Bot connected");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            inbound = receiver.next() => {
                let message = match inbound {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        tracing::debug!(self_id = %self_id, error = %e, "Socket read failed");
                        break;
                    }
                    None => break,
                };

                match message {
                    Message::Text(text) => dispatcher.handle_frame(text.as_str()).await,
                    Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                        Ok(text) => dispatcher.handle_frame(text).await,
                        Err(_) => {
                            tracing::warn!(self_id = %self_id, len = bytes.len(), "Non UTF-8 binary frame dropped");
                        }
                    },
                    Message::Ping(payload) => {
                        if sender.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Message::Pong(_) => {}
                    Message::Close(_) => break,
                }
            }
        }
    }

    tracing::info!(self_id = %self_id, "Bot disconnected");
}
