//! Per-user analysis history.
//!
//! Append-only collection keyed by user id; the only removal is a bulk
//! clear of one user's records.

pub mod sqlite;

use async_trait::async_trait;
use gaugyan_common::{AnalysisRecord, UserId};

pub use sqlite::SqliteHistoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] crate::db::DbError),

    #[error("corrupt history row {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, user_id: &UserId, record: &AnalysisRecord) -> Result<(), StoreError>;

    /// All records of one user, newest first
    async fn list_all(&self, user_id: &UserId) -> Result<Vec<AnalysisRecord>, StoreError>;

    /// Delete all records of one user; returns how many were removed
    async fn clear(&self, user_id: &UserId) -> Result<usize, StoreError>;
}
