//! # Durable Record Store
//!
//! Local append-only buffer of sampled records, each flagged synced or not.
//!
//! Records are only ever created unsynced, and the only mutation is
//! `mark_synced`, which flips the flag from false to true.

pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{NewRecord, Record};

pub use sqlite::SqliteRecordStore;

/// Local record buffer consumed by the sampler and the sync driver
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append a new unsynced record and return its id
    async fn append(&self, record: NewRecord) -> Result<i64>;

    /// Every record not yet acknowledged by the remote store, oldest first
    async fn list_unsynced(&self) -> Result<Vec<Record>>;

    /// Mark a record as synced
    async fn mark_synced(&self, id: i64) -> Result<()>;

    /// The most recently appended record
    async fn latest(&self) -> Result<Option<Record>>;

    /// Total number of records, synced or not
    async fn count(&self) -> Result<u64>;
}
