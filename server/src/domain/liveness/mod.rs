//! Bot and endpoint liveness
//!
//! - `heartbeat` - passive: silence past a timeout marks a bot offline
//! - `probe` - active: periodic reachability checks of configured endpoints

mod heartbeat;
mod probe;

pub use heartbeat::{LastSeenTable, LivenessHandle, LivenessSweeper, Touch};
pub use probe::{EndpointProber, ProbeError};
