//! SQLite-backed [`RecordStore`].

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::RecordStore;
use crate::error::{Result, SurveyError};
use crate::model::{NewRecord, Record, SignalSample};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp      TEXT    NOT NULL,
    latitude       REAL    NOT NULL,
    longitude      REAL    NOT NULL,
    altitude       REAL    NOT NULL,
    signal_quality TEXT    NOT NULL,
    synced         INTEGER NOT NULL DEFAULT 0 CHECK (synced IN (0, 1))
);
CREATE INDEX IF NOT EXISTS records_unsynced ON records (id) WHERE synced = 0;
";

const RECORD_COLUMNS: &str =
    "id, timestamp, latitude, longitude, altitude, signal_quality, synced";

/// Record store in a single SQLite file
///
/// The connection is shared behind a mutex; every call runs on the blocking
/// thread pool.
#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRecordStore").finish_non_exhaustive()
    }
}

impl SqliteRecordStore {
    /// Open (or create) the store at `path`
    ///
    /// # Errors
    ///
    /// Returns `Sqlite` if the file cannot be opened or the schema cannot be created
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        info!("Opened record store at {}", path.display());
        Self::init(conn)
    }

    /// Open a throwaway store held in memory
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            f(&conn)
        })
        .await
        .map_err(|e| SurveyError::StoreWrite(format!("record store task failed: {}", e)))?
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        altitude: row.get(4)?,
        signal_quality: SignalSample::new(row.get::<_, String>(5)?),
        synced: row.get(6)?,
    })
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn append(&self, record: NewRecord) -> Result<i64> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO records (timestamp, latitude, longitude, altitude, signal_quality, synced)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0)",
                params![
                    record.timestamp,
                    record.latitude,
                    record.longitude,
                    record.altitude,
                    record.signal_quality.as_str(),
                ],
            )?;
            let id = conn.last_insert_rowid();
            debug!("Appended record {}", id);
            Ok(id)
        })
        .await
    }

    async fn list_unsynced(&self) -> Result<Vec<Record>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM records WHERE synced = 0 ORDER BY id",
                RECORD_COLUMNS
            ))?;
            let records = stmt
                .query_map([], row_to_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }

    async fn mark_synced(&self, id: i64) -> Result<()> {
        self.with_conn(move |conn| {
            let updated = conn.execute("UPDATE records SET synced = 1 WHERE id = ?1", params![id])?;
            if updated == 0 {
                return Err(SurveyError::StoreWrite(format!("no local record with id {}", id)));
            }
            Ok(())
        })
        .await
    }

    async fn latest(&self) -> Result<Option<Record>> {
        self.with_conn(|conn| {
            let record = conn
                .query_row(
                    &format!("SELECT {} FROM records ORDER BY id DESC LIMIT 1", RECORD_COLUMNS),
                    [],
                    row_to_record,
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }
}
