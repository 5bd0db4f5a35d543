//! Entity store trait definition
//!
//! This module defines the `EntityStore` trait that all storage
//! implementations must implement. The monitoring pipeline only ever
//! talks to the store through this trait.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StorageResult;
use super::schema::{Event, Indication, IndicationStatus, Limitation, Sensor};

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Typed CRUD over sensors, limitations, indications and events
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`; a single store is shared by
/// every concurrent `ingest` call. Isolation between those calls is the
/// store's responsibility.
///
/// ## Ordering
///
/// All list operations return rows ordered by time, oldest first.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Look up a sensor by id
    async fn get_sensor(&self, id: i64) -> StorageResult<Option<Sensor>>;

    /// Register a new sensor and return it with its assigned id
    async fn create_sensor(
        &self,
        room_id: i64,
        sensor_type: &str,
        active: bool,
    ) -> StorageResult<Sensor>;

    /// Look up the limitation for a `(sensor_type, room_id)` pair
    async fn get_limitation(
        &self,
        sensor_type: &str,
        room_id: i64,
    ) -> StorageResult<Option<Limitation>>;

    /// Create or replace the limitation for a `(sensor_type, room_id)` pair
    ///
    /// Fails with `StorageError::InvalidConfig` if `min > max`.
    async fn set_limitation(&self, limitation: Limitation) -> StorageResult<()>;

    /// Indications of a sensor with `time >= since`
    async fn list_indications(
        &self,
        sensor_id: i64,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<Indication>>;

    /// Number of indications (of any sensor) with `time < cutoff`
    async fn count_indications_older_than(&self, cutoff: DateTime<Utc>) -> StorageResult<u64>;

    /// Delete indications (of any sensor) with `time < cutoff`
    ///
    /// Returns the number of deleted rows; zero is not an error.
    async fn delete_indications_older_than(&self, cutoff: DateTime<Utc>) -> StorageResult<u64>;

    /// Append a reading; `time == None` means "now"
    ///
    /// Indications are never replaced: a second reading of the same sensor
    /// at the same (stored) time fails with `StorageError::Conflict`.
    async fn create_indication(
        &self,
        sensor_id: i64,
        time: Option<DateTime<Utc>>,
        value: f64,
        status: IndicationStatus,
    ) -> StorageResult<Indication>;

    /// All events of a sensor; the last element is the most recent
    async fn list_events(&self, sensor_id: i64) -> StorageResult<Vec<Event>>;

    /// The open (not eliminated) event of a sensor, if any
    async fn open_event(&self, sensor_id: i64) -> StorageResult<Option<Event>>;

    /// Record a new event; `time == None` means "now"
    ///
    /// Creating a second open event for a sensor fails with
    /// `StorageError::Conflict`.
    async fn create_event(
        &self,
        sensor_id: i64,
        time: Option<DateTime<Utc>>,
        eliminated: bool,
        description: &str,
    ) -> StorageResult<Event>;

    /// Mark the event `(sensor_id, time)` as eliminated
    ///
    /// Returns `false` if no such event exists.
    async fn eliminate_event(&self, sensor_id: i64, time: DateTime<Utc>) -> StorageResult<bool>;

    /// Check backend health
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Human-readable statistics about the backend
    async fn get_stats(&self) -> StorageResult<String>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
