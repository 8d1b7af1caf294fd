//! Inbound bot events
//!
//! - `types` - typed OneBot events and identifier coercion
//! - `dispatch` - frame classification and routing to the aggregator

mod dispatch;
mod types;

pub use dispatch::{DispatchError, Dispatcher, classify};
pub use types::{
    Event, EventKind, MessageEvent, MetaEvent, MetaStat, MetaStatus, NoticeAction, NoticeEvent,
    NumericOrString, Sender, SubjectId,
};
