//! Summary Store: durable `(topic_id, summary_date)` → `SummaryRecord` storage
//! plus the generation lease table.
//!
//! All cross-request coordination goes through this trait. Both operations
//! that matter for correctness are conditional writes evaluated by the store:
//!
//! - `upsert` never replaces a `ready` record.
//! - `acquire_lease` only succeeds on an absent or expired lease.
//!
//! Backends: `PgSummaryStore` (production) and `MemorySummaryStore` (tests and
//! database-less local runs).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::summary::{GenerationLease, SummaryRecord};

pub use memory::MemorySummaryStore;
pub use postgres::PgSummaryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    Written(SummaryRecord),
    /// The key already holds a `ready` record; nothing was written.
    Rejected,
}

/// Inclusive date range for history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }
}

#[async_trait]
pub trait SummaryStore: Send + Sync {
    async fn get(
        &self,
        topic_id: &str,
        date: NaiveDate,
    ) -> Result<Option<SummaryRecord>, StoreError>;

    /// Writes `record` unless its key already holds a `ready` record.
    async fn upsert(&self, record: &SummaryRecord) -> Result<UpsertOutcome, StoreError>;

    /// Records in `range` ordered by date ascending, at most `limit` of them.
    /// Restart from the day after the last returned date to page.
    async fn list(
        &self,
        topic_id: &str,
        range: DateRange,
        limit: usize,
    ) -> Result<Vec<SummaryRecord>, StoreError>;

    /// Removes the record for a key regardless of status. Returns whether one existed.
    async fn delete(&self, topic_id: &str, date: NaiveDate) -> Result<bool, StoreError>;

    /// Claims the key for `holder_id` until `now + ttl`. Succeeds only when no
    /// lease exists or the existing one expired at or before `now`.
    async fn acquire_lease(
        &self,
        topic_id: &str,
        date: NaiveDate,
        holder_id: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Drops the lease if `holder_id` still owns it. A reclaimed lease is left alone.
    async fn release_lease(
        &self,
        topic_id: &str,
        date: NaiveDate,
        holder_id: Uuid,
    ) -> Result<(), StoreError>;

    async fn get_lease(
        &self,
        topic_id: &str,
        date: NaiveDate,
    ) -> Result<Option<GenerationLease>, StoreError>;
}
