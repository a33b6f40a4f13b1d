//! PostgreSQL/PostGIS-backed [`RemoteStore`].
//!
//! Every value is bound as a query parameter; nothing is formatted into SQL.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};

use super::RemoteStore;
use crate::config::RemoteConfig;
use crate::error::{Result, SurveyError};
use crate::model::{GeoPoint, PendingWeather, Record, RemoteRecord};

/// Geographic coordinates, WGS84
pub const SRID_WGS84: i32 = 4326;

const UPSERT_SAMPLE: &str = r#"
    INSERT INTO samples (id, alt, csq, "timestamp", geom, weather)
    VALUES ($1, $2, $3, $4, ST_SetSRID(ST_MakePoint($5, $6), $7), NULL)
    ON CONFLICT (id) DO UPDATE
    SET alt = EXCLUDED.alt,
        csq = EXCLUDED.csq,
        "timestamp" = EXCLUDED."timestamp",
        geom = EXCLUDED.geom
"#;

const SELECT_MISSING_WEATHER: &str = r#"
    SELECT id, "timestamp", ST_AsGeoJSON(geom) AS geom
    FROM samples
    WHERE weather IS NULL
    ORDER BY id
"#;

const UPDATE_WEATHER: &str = "UPDATE samples SET weather = $1 WHERE id = $2";

const SELECT_ALL: &str = r#"
    SELECT id, alt, csq, "timestamp", weather, ST_AsGeoJSON(geom) AS geom
    FROM samples
    ORDER BY id
"#;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS samples (
        id          BIGINT PRIMARY KEY,
        alt         DOUBLE PRECISION NOT NULL,
        csq         TEXT NOT NULL,
        "timestamp" TIMESTAMPTZ NOT NULL,
        geom        geometry(Point, 4326) NOT NULL,
        weather     TEXT
    )
"#;

const CREATE_MISSING_WEATHER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS samples_missing_weather ON samples (id) WHERE weather IS NULL";

/// Remote store on a pooled PostgreSQL connection
#[derive(Debug, Clone)]
pub struct PgRemoteStore {
    pool: PgPool,
}

impl PgRemoteStore {
    /// Wrap an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool that connects on first use
    ///
    /// The collector must start without network access, so no connection is
    /// attempted here; an unreachable server surfaces as a failed sync tick.
    pub fn connect_lazy(config: &RemoteConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_lazy_with(options);

        info!(
            "Remote store configured at {}:{}/{}",
            config.host, config.port, config.database
        );
        Self { pool }
    }

    /// Create the `samples` table and its index if they do not exist
    ///
    /// Requires the PostGIS extension in the target database.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_MISSING_WEATHER_INDEX)
            .execute(&self.pool)
            .await?;
        debug!("Remote schema ready");
        Ok(())
    }
}

fn parse_geom(id: i64, geojson: &str) -> Option<GeoPoint> {
    match serde_json::from_str::<GeoPoint>(geojson) {
        Ok(point) => Some(point),
        Err(e) => {
            warn!("Record {} has unreadable geometry {}: {}", id, geojson, e);
            None
        }
    }
}

fn row_to_pending(row: &PgRow) -> Result<Option<PendingWeather>> {
    let id: i64 = row.try_get("id")?;
    let timestamp: DateTime<Utc> = row.try_get("timestamp")?;
    let geom: String = row.try_get("geom")?;
    Ok(parse_geom(id, &geom).map(|geom| PendingWeather { id, timestamp, geom }))
}

fn row_to_remote(row: &PgRow) -> Result<Option<RemoteRecord>> {
    let id: i64 = row.try_get("id")?;
    let geom: String = row.try_get("geom")?;
    let Some(geom) = parse_geom(id, &geom) else {
        return Ok(None);
    };
    Ok(Some(RemoteRecord {
        id,
        altitude: row.try_get("alt")?,
        signal_quality: row.try_get("csq")?,
        timestamp: row.try_get("timestamp")?,
        weather: row.try_get("weather")?,
        geom,
    }))
}

#[async_trait]
impl RemoteStore for PgRemoteStore {
    async fn upsert(&self, record: &Record) -> Result<()> {
        sqlx::query(UPSERT_SAMPLE)
            .bind(record.id)
            .bind(record.altitude)
            .bind(record.signal_quality.as_str())
            .bind(record.timestamp)
            .bind(record.longitude)
            .bind(record.latitude)
            .bind(SRID_WGS84)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn select_missing_weather(&self) -> Result<Vec<PendingWeather>> {
        let rows = sqlx::query(SELECT_MISSING_WEATHER)
            .fetch_all(&self.pool)
            .await?;

        let mut pending = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(item) = row_to_pending(row)? {
                pending.push(item);
            }
        }
        Ok(pending)
    }

    async fn update_weather(&self, id: i64, payload: &str) -> Result<()> {
        let result = sqlx::query(UPDATE_WEATHER)
            .bind(payload)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SurveyError::StoreWrite(format!(
                "no remote record with id {}",
                id
            )));
        }
        Ok(())
    }

    async fn select_all(&self) -> Result<Vec<RemoteRecord>> {
        let rows = sqlx::query(SELECT_ALL).fetch_all(&self.pool).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(record) = row_to_remote(row)? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries_use_placeholders_only() {
        for sql in [UPSERT_SAMPLE, UPDATE_WEATHER] {
            assert!(!sql.contains('\''), "query should not embed literals: {}", sql);
        }
        assert!(UPSERT_SAMPLE.contains("$7"));
        assert!(UPDATE_WEATHER.contains("$2"));
    }

    #[test]
    fn test_upsert_preserves_weather() {
        let update_clause = UPSERT_SAMPLE.split("DO UPDATE").nth(1).unwrap();
        assert!(!update_clause.contains("weather"));
    }

    #[test]
    fn test_parse_geom() {
        let point = parse_geom(1, r#"{"type":"Point","coordinates":[-122.4194,37.7749]}"#).unwrap();
        assert_eq!(point.longitude(), -122.4194);
        assert_eq!(point.latitude(), 37.7749);
        assert!(parse_geom(1, "not json").is_none());
    }

    #[tokio::test]
    async fn test_connect_lazy_does_not_touch_network() {
        let config = RemoteConfig {
            host: "db.invalid".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "password".to_string(),
            database: "gpssamples".to_string(),
            max_connections: 2,
            connect_timeout_secs: 1,
            create_schema: false,
        };
        let store = PgRemoteStore::connect_lazy(&config);
        assert_eq!(store.pool.size(), 0);
    }
}
