//! Frame classification and routing
//!
//! A frame is a notice when it carries a non-empty `notice_type`; otherwise
//! `post_type` decides between message and meta. Anything else is dropped.
//! Nothing here closes a connection: every failure is reported per frame.

use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{Event, EventKind, MessageEvent, MetaEvent, NoticeEvent};
use crate::data::sqlite::SqliteError;
use crate::domain::aggregate::Aggregator;
use crate::domain::liveness::LivenessHandle;

#[derive(Error, Debug)]
pub enum DispatchError {
    /// Not a JSON object
    #[error("Malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Invalid {kind} event: {source}")]
    Decode {
        kind: EventKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown event kind '{0}'")]
    UnknownKind(String),

    #[error("Frame has neither notice_type nor post_type")]
    MissingKind,

    #[error("Failed to apply {kind} event: {source}")]
    Store {
        kind: EventKind,
        #[source]
        source: SqliteError,
    },
}

/// Decode a text frame into a typed event
pub fn classify(frame: &str) -> Result<Event, DispatchError> {
    let object: Map<String, Value> =
        serde_json::from_str(frame).map_err(DispatchError::Malformed)?;

    let is_notice = object
        .get("notice_type")
        .and_then(Value::as_str)
        .is_some_and(|t| !t.is_empty());
    if is_notice {
        return decode::<NoticeEvent>(object, EventKind::Notice).map(Event::Notice);
    }

    let post_type = match object.get("post_type") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => return Err(DispatchError::UnknownKind(other.to_string())),
        None => return Err(DispatchError::MissingKind),
    };

    match post_type.as_str() {
        "message" => decode::<MessageEvent>(object, EventKind::Message).map(Event::Message),
        "meta_event" => decode::<MetaEvent>(object, EventKind::Meta).map(Event::Meta),
        _ => Err(DispatchError::UnknownKind(post_type)),
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    object: Map<String, Value>,
    kind: EventKind,
) -> Result<T, DispatchError> {
    serde_json::from_value(Value::Object(object))
        .map_err(|source| DispatchError::Decode { kind, source })
}

/// Routes decoded events to the aggregator and feeds the liveness tracker
#[derive(Clone)]
pub struct Dispatcher {
    aggregator: Aggregator,
    liveness: LivenessHandle,
    log_frames: bool,
}

impl Dispatcher {
    pub fn new(aggregator: Aggregator, liveness: LivenessHandle, log_frames: bool) -> Self {
        Self {
            aggregator,
            liveness,
            log_frames,
        }
    }

    /// Classify and apply one frame
    pub async fn dispatch(&self, frame: &str) -> Result<EventKind, DispatchError> {
        if self.log_frames {
            tracing::debug!(frame, "Inbound frame");
        }

        let event = classify(frame)?;
        let kind = event.kind();

        if !event.self_id().is_empty() {
            self.liveness.touch(event.self_id());
        }

        let result = match &event {
            Event::Message(message) => self.aggregator.apply_message(message).await.map(|_| ()),
            Event::Meta(meta) => self.aggregator.apply_meta(meta).await,
            Event::Notice(notice) => self.aggregator.apply_notice(notice).await.map(|_| ()),
        };
        result.map_err(|source| DispatchError::Store { kind, source })?;

        tracing::trace!(kind = %kind, self_id = %event.self_id(), "Event applied");
        Ok(kind)
    }

    /// Dispatch a frame and log the outcome; never fails
    pub async fn handle_frame(&self, frame: &str) {
        match self.dispatch(frame).await {
            Ok(_) => {}
            Err(e @ DispatchError::Store { .. }) => {
                tracing::error!(error = %e, "Event dropped");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Frame dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::{bot_status, messages};
    use crate::data::sqlite::test_pool;
    use crate::domain::liveness::{LivenessHandle, Touch};
    use crate::utils::time::{Calendar, format_date};
    use tokio::sync::mpsc;

    const MESSAGE: &str = r#"{
        "post_type": "message", "message_type": "group", "time": 1704877200,
        "self_id": 10001, "message_id": 1, "user_id": 42, "group_id": 7,
        "raw_message": "/help me", "sender": { "nickname": "alice", "role": "member" }
    }"#;

    #[test]
    fn test_classify_message() {
        let event = classify(MESSAGE).unwrap();
        assert_eq!(event.kind(), EventKind::Message);
        assert_eq!(event.self_id().as_str(), "10001");
    }

    #[test]
    fn test_notice_type_wins_over_post_type() {
        let frame = r#"{"post_type": "message", "notice_type": "group_increase",
                        "sub_type": "invite", "time": 1, "self_id": 1}"#;
        assert_eq!(classify(frame).unwrap().kind(), EventKind::Notice);
    }

    #[test]
    fn test_empty_notice_type_falls_through() {
        let frame = r#"{"post_type": "meta_event", "notice_type": "", "time": 1, "self_id": 1}"#;
        assert_eq!(classify(frame).unwrap().kind(), EventKind::Meta);
    }

    #[test]
    fn test_classify_errors() {
        assert!(matches!(classify("not json"), Err(DispatchError::Malformed(_))));
        assert!(matches!(classify("[1, 2]"), Err(DispatchError::Malformed(_))));
        assert!(matches!(classify(r#"{"time": 1}"#), Err(DispatchError::MissingKind)));
        assert!(matches!(
            classify(r#"{"post_type": "request", "time": 1}"#),
            Err(DispatchError::UnknownKind(k)) if k == "request"
        ));
        assert!(matches!(
            classify(r#"{"post_type": 3}"#),
            Err(DispatchError::UnknownKind(_))
        ));
        assert!(matches!(
            classify(r#"{"post_type": "message", "self_id": 1}"#),
            Err(DispatchError::Decode { kind: EventKind::Message, .. })
        ));
        assert!(matches!(
            classify(r#"{"post_type": "message", "time": 1, "user_id": 1.5}"#),
            Err(DispatchError::Decode { kind: EventKind::Message, .. })
        ));
    }

    fn dispatcher(pool: sqlx::SqlitePool) -> (Dispatcher, mpsc::Receiver<Touch>) {
        let (liveness, rx) = LivenessHandle::channel(16);
        let aggregator = Aggregator::new(pool, Calendar::utc());
        (Dispatcher::new(aggregator, liveness, false), rx)
    }

    #[tokio::test]
    async fn test_dispatch_applies_and_touches() {
        let pool = test_pool().await;
        let (dispatcher, mut touches) = dispatcher(pool.clone());

        let kind = dispatcher.dispatch(MESSAGE).await.unwrap();
        assert_eq!(kind, EventKind::Message);

        assert!(messages::get_message(&pool, "1").await.unwrap().is_some());
        let touch = touches.try_recv().unwrap();
        assert_eq!(touch.self_id.as_str(), "10001");
    }

    #[tokio::test]
    async fn test_bad_frame_does_not_stop_next_frame() {
        let pool = test_pool().await;
        let (dispatcher, _touches) = dispatcher(pool.clone());

        dispatcher.handle_frame("{garbage").await;
        dispatcher
            .handle_frame(r#"{"post_type": "message", "time": "soon"}"#)
            .await;
        dispatcher.handle_frame(MESSAGE).await;

        assert_eq!(messages::count_messages(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_meta_without_self_id_skips_touch() {
        let pool = test_pool().await;
        let (dispatcher, mut touches) = dispatcher(pool.clone());

        dispatcher
            .dispatch(r#"{"post_type": "meta_event", "meta_event_type": "heartbeat", "time": 1}"#)
            .await
            .unwrap();
        assert!(touches.try_recv().is_err());

        dispatcher
            .dispatch(
                r#"{"post_type": "meta_event", "meta_event_type": "lifecycle",
                    "sub_type": "connect", "time": 1, "self_id": 9}"#,
            )
            .await
            .unwrap();
        assert!(touches.try_recv().is_ok());
        let today = format_date(Calendar::utc().today());
        let row = bot_status::get_bot_day(&pool, "9", &today).await.unwrap().unwrap();
        assert!(row.online);
    }

    #[tokio::test]
    async fn test_store_failure_reported() {
        let pool = test_pool().await;
        let (dispatcher, _touches) = dispatcher(pool.clone());
        sqlx::query("DROP TABLE messages").execute(&pool).await.unwrap();

        let err = dispatcher.dispatch(MESSAGE).await.unwrap_err();
        assert!(matches!(err, DispatchError::Store { kind: EventKind::Message, .. }));
    }
}
