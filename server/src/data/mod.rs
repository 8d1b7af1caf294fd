//! Data storage layer
//!
//! - `sqlite` - Embedded store for the aggregate tables, schema and repositories

pub mod sqlite;

pub use sqlite::SqliteService;
