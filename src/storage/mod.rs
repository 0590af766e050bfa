//! Persistence layer: SQLite via sqlx.
//!
//! `schema.rs` owns the pool and migrations; episode and sync-log
//! operations live in their own files as `impl Database` blocks.

mod episodes;
mod schema;
mod sync_log;
mod types;

pub use schema::Database;
pub use types::{DatabaseError, Episode, SyncRun, SyncStatus};
