//! In-memory storage backend (no persistence)
//!
//! This backend keeps all entities in maps guarded by a single
//! `RwLock`. It's useful for:
//! - Testing without database dependencies
//! - Running the pipeline with `"backend": "none"`
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost on restart
//! - **Single process**: Nothing is shared between instances

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::backend::{EntityStore, HealthStatus};
use super::error::{StorageError, StorageResult};
use super::schema::{Event, Indication, IndicationStatus, Limitation, Sensor};

#[derive(Debug, Default)]
struct Tables {
    next_sensor_id: i64,
    sensors: HashMap<i64, Sensor>,
    limitations: HashMap<(String, i64), Limitation>,

    /// Keyed by `(sensor_id, time)`, so iteration per sensor is time ordered
    indications: BTreeMap<(i64, DateTime<Utc>), Indication>,
    events: BTreeMap<(i64, DateTime<Utc>), Event>,
}

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<Tables>,
}

impl MemoryBackend {
    /// Create a new, empty in-memory backend
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for MemoryBackend {
    async fn get_sensor(&self, id: i64) -> StorageResult<Option<Sensor>> {
        Ok(self.tables.read().await.sensors.get(&id).cloned())
    }

    async fn create_sensor(
        &self,
        room_id: i64,
        sensor_type: &str,
        active: bool,
    ) -> StorageResult<Sensor> {
        let mut tables = self.tables.write().await;
        tables.next_sensor_id += 1;

        let sensor = Sensor {
            id: tables.next_sensor_id,
            room_id,
            sensor_type: sensor_type.to_string(),
            active,
        };
        tables.sensors.insert(sensor.id, sensor.clone());

        debug!("registered sensor {} in room {}", sensor.id, room_id);
        Ok(sensor)
    }

    async fn get_limitation(
        &self,
        sensor_type: &str,
        room_id: i64,
    ) -> StorageResult<Option<Limitation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .limitations
            .get(&(sensor_type.to_string(), room_id))
            .cloned())
    }

    async fn set_limitation(&self, limitation: Limitation) -> StorageResult<()> {
        if limitation.min > limitation.max {
            return Err(StorageError::InvalidConfig(format!(
                "limitation min {} exceeds max {}",
                limitation.min, limitation.max
            )));
        }

        let key = (limitation.sensor_type.clone(), limitation.room_id);
        self.tables.write().await.limitations.insert(key, limitation);
        Ok(())
    }

    async fn list_indications(
        &self,
        sensor_id: i64,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<Indication>> {
        let tables = self.tables.read().await;
        Ok(tables
            .indications
            .range((sensor_id, since)..=(sensor_id, DateTime::<Utc>::MAX_UTC))
            .map(|(_, indication)| indication.clone())
            .collect())
    }

    async fn count_indications_older_than(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .indications
            .values()
            .filter(|indication| indication.time < cutoff)
            .count() as u64)
    }

    #[instrument(skip(self), fields(cutoff = %cutoff))]
    async fn delete_indications_older_than(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.indications.len();
        tables
            .indications
            .retain(|_, indication| indication.time >= cutoff);

        Ok((before - tables.indications.len()) as u64)
    }

    async fn create_indication(
        &self,
        sensor_id: i64,
        time: Option<DateTime<Utc>>,
        value: f64,
        status: IndicationStatus,
    ) -> StorageResult<Indication> {
        let mut tables = self.tables.write().await;
        let time = time.unwrap_or_else(Utc::now);

        if tables.indications.contains_key(&(sensor_id, time)) {
            return Err(StorageError::Conflict(format!(
                "indication for sensor {sensor_id} at {time} already exists"
            )));
        }

        let indication = Indication {
            sensor_id,
            time,
            value,
            status,
        };
        tables
            .indications
            .insert((sensor_id, time), indication.clone());
        Ok(indication)
    }

    async fn list_events(&self, sensor_id: i64) -> StorageResult<Vec<Event>> {
        let tables = self.tables.read().await;
        Ok(tables
            .events
            .range((sensor_id, DateTime::<Utc>::MIN_UTC)..=(sensor_id, DateTime::<Utc>::MAX_UTC))
            .map(|(_, event)| event.clone())
            .collect())
    }

    async fn open_event(&self, sensor_id: i64) -> StorageResult<Option<Event>> {
        let events = self.list_events(sensor_id).await?;
        Ok(events.into_iter().rev().find(Event::is_open))
    }

    async fn create_event(
        &self,
        sensor_id: i64,
        time: Option<DateTime<Utc>>,
        eliminated: bool,
        description: &str,
    ) -> StorageResult<Event> {
        let mut tables = self.tables.write().await;
        let time = time.unwrap_or_else(Utc::now);

        if !eliminated
            && tables
                .events
                .values()
                .any(|event| event.sensor_id == sensor_id && event.is_open())
        {
            return Err(StorageError::Conflict(format!(
                "sensor {sensor_id} already has an open event"
            )));
        }

        if tables.events.contains_key(&(sensor_id, time)) {
            return Err(StorageError::Conflict(format!(
                "event for sensor {sensor_id} at {time} already exists"
            )));
        }

        let event = Event {
            sensor_id,
            time,
            eliminated,
            description: description.to_string(),
        };
        tables.events.insert((sensor_id, time), event.clone());
        Ok(event)
    }

    async fn eliminate_event(&self, sensor_id: i64, time: DateTime<Utc>) -> StorageResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.events.get_mut(&(sensor_id, time)) {
            Some(event) => {
                event.eliminated = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let tables = self.tables.read().await;
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                (
                    "indications".to_string(),
                    tables.indications.len().to_string(),
                ),
            ]),
        })
    }

    async fn get_stats(&self) -> StorageResult<String> {
        let tables = self.tables.read().await;
        Ok(format!(
            "In-Memory: {} sensors, {} indications, {} events",
            tables.sensors.len(),
            tables.indications.len(),
            tables.events.len()
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend (no-op)");
        Ok(())
    }
}
