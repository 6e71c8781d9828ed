//! Storage abstractions for notice persistence and crawl progress.
//!
//! - [`Repository`]: relational store for notices, upserted by
//!   `(notice_code, degree)`
//! - [`CheckpointStore`]: the single `(page, row_index)` resume cursor

mod checkpoint;
mod sqlite;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::models::{BidNotice, Checkpoint};

// Re-export for convenience
pub use checkpoint::FileCheckpointStore;
pub use sqlite::SqliteRepository;

/// Most recent posting date already stored. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastSeen {
    pub last_date: String,
}

/// Trait for notice storage backends.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Open the backend and make sure the schema exists.
    async fn connect(&mut self) -> Result<()>;

    /// Insert or update every notice, replacing its detail and attachment
    /// list. All or nothing per call. Returns the number of notices written.
    async fn upsert_batch(&self, notices: &[BidNotice]) -> Result<usize>;

    /// Latest stored posting date, if any.
    async fn last_seen(&self) -> Result<Option<LastSeen>>;

    async fn close(&mut self) -> Result<()>;
}

/// Durable resume cursor. Only the crawl session writes it.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// `None` when no run is in progress.
    async fn load(&self) -> Result<Option<Checkpoint>>;

    async fn save(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Remove the cursor. Succeeds when there is none.
    async fn clear(&self) -> Result<()>;
}
