//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::model::{CommentBatch, ContentItem, CreatorProfile};
use crate::storage::{RunStats, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store connection lock poisoned")]
    Poisoned,

    #[error("Run not found: {0}")]
    RunNotFound(i64),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for storage backend implementations
///
/// Every write is an upsert keyed by the record's id, so replaying a page
/// after a crash never duplicates rows. Implementations are shared between
/// concurrent harvest tasks and must be thread-safe.
pub trait Store: Send + Sync {
    // ===== Harvested records =====

    /// Inserts or refreshes a note
    fn upsert_content(&self, item: &ContentItem) -> StoreResult<()>;

    /// Inserts or refreshes every comment in a batch
    fn upsert_comments(&self, batch: &CommentBatch) -> StoreResult<()>;

    /// Inserts or refreshes a creator profile
    fn upsert_creator(&self, profile: &CreatorProfile) -> StoreResult<()>;

    // ===== Checkpoints =====

    /// Reads the stored watermark for a creator
    fn get_checkpoint(&self, owner_id: &str) -> StoreResult<Option<i64>>;

    /// Raises the watermark for a creator; never lowers it
    fn advance_checkpoint(&self, owner_id: &str, ts: i64) -> StoreResult<()>;

    // ===== Media =====

    /// Persists a downloaded picture
    ///
    /// # Returns
    ///
    /// Where the picture was written
    fn save_media(&self, media_id: &str, extension: &str, bytes: &[u8]) -> StoreResult<String>;

    // ===== Run bookkeeping =====

    /// Records the start of a harvest run
    fn begin_run(&self, _config_hash: &str) -> StoreResult<i64> {
        Ok(0)
    }

    /// Records the outcome of a harvest run
    fn finish_run(&self, _run_id: i64, _status: RunStatus, _stats: &RunStats) -> StoreResult<()> {
        Ok(())
    }
}
