//! BotBoard: activity statistics and liveness for OneBot bots

pub mod api;
pub mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;
