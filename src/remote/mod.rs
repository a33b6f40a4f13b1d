//! # Remote Store
//!
//! The shared geospatial table the collector syncs into and the weather
//! backfill enriches.

pub mod postgres;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{PendingWeather, Record, RemoteRecord};

pub use postgres::PgRemoteStore;

/// Remote sample table
///
/// The sync driver and the backfill queue may call it concurrently; they
/// touch disjoint columns of the same rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Insert a record, or overwrite its sampled fields if the id exists
    ///
    /// Never touches the weather column, so repeating it is harmless.
    async fn upsert(&self, record: &Record) -> Result<()>;

    /// Every record whose weather is still missing
    async fn select_missing_weather(&self) -> Result<Vec<PendingWeather>>;

    /// Store the raw weather payload for one record
    async fn update_weather(&self, id: i64, payload: &str) -> Result<()>;

    /// Every record, for the read endpoint
    async fn select_all(&self) -> Result<Vec<RemoteRecord>>;
}
