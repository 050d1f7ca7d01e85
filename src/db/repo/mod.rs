//! Repository layer for database operations.
//!
//! Methods are organized across submodules by domain:
//! - `battles.rs` - battle, participant, action, and result operations
//! - `scenarios.rs` - scenario storage and lookup
//! - `points.rs` - points ledger operations

mod battles;
mod points;
mod scenarios;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

pub use battles::ParticipantSnapshot;
pub use points::LeaderboardEntry;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Convert a stored epoch-millisecond value back to a timestamp.
pub(crate) fn ts_from_ms(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
}
