//! Typed bot events
//!
//! Field names follow the OneBot v11 wire format. Unknown fields are ignored.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Largest float that still converts to `i64` without saturating
const MAX_EXACT_FLOAT_ID: f64 = 9_007_199_254_740_992.0;

/// Identifier of a bot, user, group or message
///
/// Implementations disagree on whether ids are JSON numbers or strings, so
/// every id is normalised to its decimal string form once, at decode time.
/// A missing or `null` id becomes the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for SubjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SubjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for SubjectId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw shape of an id on the wire
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumericOrString {
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl NumericOrString {
    /// Canonical string form; floats must be whole numbers
    pub fn into_subject_id(self) -> Result<SubjectId, String> {
        match self {
            Self::Int(n) => Ok(SubjectId(n.to_string())),
            Self::UInt(n) => Ok(SubjectId(n.to_string())),
            Self::Float(f) if f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT_ID => {
                Ok(SubjectId((f as i64).to_string()))
            }
            Self::Float(f) => Err(format!("id {} is not a whole number", f)),
            Self::Text(s) => Ok(SubjectId(s)),
        }
    }
}

impl<'de> Deserialize<'de> for SubjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<NumericOrString>::deserialize(deserializer)? {
            Some(raw) => raw.into_subject_id().map_err(serde::de::Error::custom),
            None => Ok(SubjectId::default()),
        }
    }
}

impl Serialize for SubjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Which of the three event kinds a frame was classified as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Message,
    Meta,
    Notice,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Message => write!(f, "message"),
            EventKind::Meta => write!(f, "meta_event"),
            EventKind::Notice => write!(f, "notice"),
        }
    }
}

/// One decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Message(MessageEvent),
    Meta(MetaEvent),
    Notice(NoticeEvent),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Message(_) => EventKind::Message,
            Event::Meta(_) => EventKind::Meta,
            Event::Notice(_) => EventKind::Notice,
        }
    }

    /// The bot the event came from
    pub fn self_id(&self) -> &SubjectId {
        match self {
            Event::Message(e) => &e.self_id,
            Event::Meta(e) => &e.self_id,
            Event::Notice(e) => &e.self_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub role: String,
}

/// A chat message seen by a bot
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageEvent {
    /// Unix seconds
    pub time: i64,
    #[serde(default)]
    pub self_id: SubjectId,
    /// `group` or `private`
    #[serde(default)]
    pub message_type: String,
    #[serde(default)]
    pub sub_type: String,
    #[serde(default)]
    pub message_id: SubjectId,
    #[serde(default)]
    pub user_id: SubjectId,
    /// Empty for private messages
    #[serde(default)]
    pub group_id: SubjectId,
    #[serde(default)]
    pub raw_message: String,
    #[serde(default)]
    pub sender: Sender,
}

impl MessageEvent {
    /// Text up to the first space; blank or space-led text yields `""`
    pub fn command_token(&self) -> &str {
        self.raw_message.split(' ').next().unwrap_or_default()
    }

    pub fn is_group(&self) -> bool {
        !self.group_id.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct MetaStat {
    #[serde(default)]
    pub message_received: i64,
    #[serde(default)]
    pub message_sent: i64,
    #[serde(default)]
    pub last_message_time: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct MetaStatus {
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub stat: MetaStat,
}

/// Heartbeat or lifecycle pulse from a bot
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MetaEvent {
    pub time: i64,
    #[serde(default)]
    pub self_id: SubjectId,
    /// `heartbeat` or `lifecycle`
    #[serde(default)]
    pub meta_event_type: String,
    /// Lifecycle phase: `connect`, `enable` or `disable`
    #[serde(default)]
    pub sub_type: String,
    #[serde(default)]
    pub interval: i64,
    #[serde(default)]
    pub status: Option<MetaStatus>,
}

impl MetaEvent {
    /// Online state implied by a lifecycle phase, if it implies one
    pub fn lifecycle_online(&self) -> Option<bool> {
        if self.meta_event_type != "lifecycle" {
            return None;
        }
        match self.sub_type.as_str() {
            "connect" | "enable" => Some(true),
            "disable" => Some(false),
            _ => None,
        }
    }
}

/// What a notice means for the bot's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeAction {
    /// The bot was invited into a group
    Invited,
    /// The bot was kicked from a group
    Kicked,
    Ignored,
}

/// Group membership or other notice
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NoticeEvent {
    pub time: i64,
    #[serde(default)]
    pub self_id: SubjectId,
    pub notice_type: String,
    #[serde(default)]
    pub sub_type: String,
    #[serde(default)]
    pub group_id: SubjectId,
    #[serde(default)]
    pub user_id: SubjectId,
    #[serde(default)]
    pub operator_id: SubjectId,
}

impl NoticeEvent {
    pub fn action(&self) -> NoticeAction {
        match (self.notice_type.as_str(), self.sub_type.as_str()) {
            ("group_increase", "invite") => NoticeAction::Invited,
            ("group_decrease", "kick_me") => NoticeAction::Kicked,
            _ => NoticeAction::Ignored,
        }
    }
}
