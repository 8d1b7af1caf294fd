//! Bot statistics domain logic
//!
//! - `events` - typed OneBot events and frame dispatch
//! - `aggregate` - daily and lifetime counters, streaks, first-of-day dedup
//! - `liveness` - passive bot timeout sweep and active endpoint probes

pub mod aggregate;
pub mod events;
pub mod liveness;

pub use aggregate::{Aggregator, MessageOutcome};
pub use events::{Dispatcher, Event, EventKind};
pub use liveness::{EndpointProber, LivenessHandle, LivenessSweeper};
