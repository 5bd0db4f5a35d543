//! SQLite storage backend implementation
//!
//! This module provides a SQLite-based implementation of the `EntityStore` trait.
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Better concurrency for reads during writes
//! - **Connection pooling**: Efficient resource usage
//! - **Migrations**: Automatic schema versioning with sqlx
//!
//! ## Open Events
//!
//! A partial unique index on `events (sensor_id) WHERE eliminated = 0`
//! rejects a second open event for the same sensor, even when two writers
//! race. The rejection surfaces as `StorageError::Conflict`.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{EntityStore, HealthStatus};
use super::error::{StorageError, StorageResult};
use super::schema::{Event, Indication, IndicationStatus, Limitation, Sensor};

/// SQLite storage backend
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Create a new SQLite backend
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Run migrations to create tables
    /// 3. Configure SQLite for WAL mode and foreign keys
    ///
    /// ## Example
    ///
    /// ```no_run
    /// # use sensor_monitoring::storage::sqlite::SqliteBackend;
    /// # async fn example() -> anyhow::Result<()> {
    /// let backend = SqliteBackend::new("./monitoring.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    /// Helper to convert timestamp to Unix milliseconds for SQLite
    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    /// Helper to convert Unix milliseconds from SQLite to DateTime
    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Truncate a timestamp to the precision stored in the database
    fn truncate_millis(dt: DateTime<Utc>) -> DateTime<Utc> {
        Self::millis_to_timestamp(Self::timestamp_to_millis(&dt))
    }

    fn sensor_from_row(row: &SqliteRow) -> Sensor {
        Sensor {
            id: row.get("id"),
            room_id: row.get("room_id"),
            sensor_type: row.get("sensor_type"),
            active: row.get("active"),
        }
    }

    fn indication_from_row(row: &SqliteRow) -> StorageResult<Indication> {
        let status: String = row.get("status");
        Ok(Indication {
            sensor_id: row.get("sensor_id"),
            time: Self::millis_to_timestamp(row.get("time")),
            value: row.get("value"),
            status: status.parse().map_err(StorageError::QueryFailed)?,
        })
    }

    fn event_from_row(row: &SqliteRow) -> Event {
        Event {
            sensor_id: row.get("sensor_id"),
            time: Self::millis_to_timestamp(row.get("time")),
            eliminated: row.get("eliminated"),
            description: row.get("description"),
        }
    }
}

#[async_trait]
impl EntityStore for SqliteBackend {
    #[instrument(skip(self))]
    async fn get_sensor(&self, id: i64) -> StorageResult<Option<Sensor>> {
        let row = sqlx::query("SELECT id, room_id, sensor_type, active FROM sensors WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(Self::sensor_from_row))
    }

    #[instrument(skip(self))]
    async fn create_sensor(
        &self,
        room_id: i64,
        sensor_type: &str,
        active: bool,
    ) -> StorageResult<Sensor> {
        let result =
            sqlx::query("INSERT INTO sensors (room_id, sensor_type, active) VALUES (?, ?, ?)")
                .bind(room_id)
                .bind(sensor_type)
                .bind(active)
                .execute(&self.pool)
                .await?;

        let sensor = Sensor {
            id: result.last_insert_rowid(),
            room_id,
            sensor_type: sensor_type.to_string(),
            active,
        };
        debug!("registered sensor {} in room {}", sensor.id, room_id);
        Ok(sensor)
    }

    #[instrument(skip(self))]
    async fn get_limitation(
        &self,
        sensor_type: &str,
        room_id: i64,
    ) -> StorageResult<Option<Limitation>> {
        let row = sqlx::query(
            r#"
            SELECT sensor_type, room_id, max, min
            FROM limitations
            WHERE sensor_type = ? AND room_id = ?
            "#,
        )
        .bind(sensor_type)
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Limitation {
            sensor_type: row.get("sensor_type"),
            room_id: row.get("room_id"),
            max: row.get("max"),
            min: row.get("min"),
        }))
    }

    #[instrument(skip(self), fields(sensor_type = %limitation.sensor_type, room_id = limitation.room_id))]
    async fn set_limitation(&self, limitation: Limitation) -> StorageResult<()> {
        if limitation.min > limitation.max {
            return Err(StorageError::InvalidConfig(format!(
                "limitation min {} exceeds max {}",
                limitation.min, limitation.max
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO limitations (sensor_type, room_id, max, min)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (sensor_type, room_id) DO UPDATE SET
                max = excluded.max,
                min = excluded.min
            "#,
        )
        .bind(&limitation.sensor_type)
        .bind(limitation.room_id)
        .bind(limitation.max)
        .bind(limitation.min)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_indications(
        &self,
        sensor_id: i64,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<Indication>> {
        let rows = sqlx::query(
            r#"
            SELECT sensor_id, time, value, status
            FROM indications
            WHERE sensor_id = ? AND time >= ?
            ORDER BY time ASC
            "#,
        )
        .bind(sensor_id)
        .bind(Self::timestamp_to_millis(&since))
        .fetch_all(&self.pool)
        .await?;

        let indications = rows
            .iter()
            .map(Self::indication_from_row)
            .collect::<StorageResult<Vec<_>>>()?;

        debug!("query returned {} indications", indications.len());
        Ok(indications)
    }

    #[instrument(skip(self), fields(cutoff = %cutoff))]
    async fn count_indications_older_than(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM indications WHERE time < ?")
            .bind(Self::timestamp_to_millis(&cutoff))
            .fetch_one(&self.pool)
            .await?;

        Ok(row.0 as u64)
    }

    #[instrument(skip(self), fields(cutoff = %cutoff))]
    async fn delete_indications_older_than(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM indications WHERE time < ?")
            .bind(Self::timestamp_to_millis(&cutoff))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn create_indication(
        &self,
        sensor_id: i64,
        time: Option<DateTime<Utc>>,
        value: f64,
        status: IndicationStatus,
    ) -> StorageResult<Indication> {
        let time = Self::truncate_millis(time.unwrap_or_else(Utc::now));

        sqlx::query(
            r#"
            INSERT INTO indications (sensor_id, time, value, status)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(sensor_id)
        .bind(Self::timestamp_to_millis(&time))
        .bind(value)
        .bind(status.to_string())
        .execute(&self.pool)
        .await?;

        Ok(Indication {
            sensor_id,
            time,
            value,
            status,
        })
    }

    #[instrument(skip(self))]
    async fn list_events(&self, sensor_id: i64) -> StorageResult<Vec<Event>> {
        let rows = sqlx::query(
            r#"
            SELECT sensor_id, time, eliminated, description
            FROM events
            WHERE sensor_id = ?
            ORDER BY time ASC
            "#,
        )
        .bind(sensor_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::event_from_row).collect())
    }

    #[instrument(skip(self))]
    async fn open_event(&self, sensor_id: i64) -> StorageResult<Option<Event>> {
        let row = sqlx::query(
            r#"
            SELECT sensor_id, time, eliminated, description
            FROM events
            WHERE sensor_id = ? AND eliminated = 0
            ORDER BY time DESC
            LIMIT 1
            "#,
        )
        .bind(sensor_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::event_from_row))
    }

    #[instrument(skip(self, description))]
    async fn create_event(
        &self,
        sensor_id: i64,
        time: Option<DateTime<Utc>>,
        eliminated: bool,
        description: &str,
    ) -> StorageResult<Event> {
        let time = Self::truncate_millis(time.unwrap_or_else(Utc::now));

        sqlx::query(
            r#"
            INSERT INTO events (sensor_id, time, eliminated, description)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(sensor_id)
        .bind(Self::timestamp_to_millis(&time))
        .bind(eliminated)
        .bind(description)
        .execute(&self.pool)
        .await?;

        Ok(Event {
            sensor_id,
            time,
            eliminated,
            description: description.to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn eliminate_event(&self, sensor_id: i64, time: DateTime<Utc>) -> StorageResult<bool> {
        let result = sqlx::query("UPDATE events SET eliminated = 1 WHERE sensor_id = ? AND time = ?")
            .bind(sensor_id)
            .bind(Self::timestamp_to_millis(&time))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => Ok(HealthStatus {
                healthy: true,
                message: "SQLite backend operational".to_string(),
                metadata: HashMap::from([
                    ("backend".to_string(), "sqlite".to_string()),
                    ("db_path".to_string(), self.db_path.clone()),
                ]),
            }),
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_stats(&self) -> StorageResult<String> {
        let (sensors,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sensors")
            .fetch_one(&self.pool)
            .await?;
        let (indications,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM indications")
            .fetch_one(&self.pool)
            .await?;
        let (open_events,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM events WHERE eliminated = 0")
                .fetch_one(&self.pool)
                .await?;
        let (oldest, newest): (Option<i64>, Option<i64>) =
            sqlx::query_as("SELECT MIN(time), MAX(time) FROM indications")
                .fetch_one(&self.pool)
                .await?;

        let file_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);
        let file_size_mb = file_size as f64 / 1_000_000.0;

        let time_range = match (oldest, newest) {
            (Some(old), Some(new)) => format!(
                "{} to {}",
                Self::millis_to_timestamp(old).format("%Y-%m-%d %H:%M"),
                Self::millis_to_timestamp(new).format("%Y-%m-%d %H:%M")
            ),
            _ => "no data".to_string(),
        };

        Ok(format!(
            "SQLite: {} sensors, {} indications, {} open events, {:.2} MB on disk, time range: {}",
            sensors, indications, open_events, file_size_mb, time_range
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
