//! Failure injection for tests
//!
//! Wraps a [`MemoryBackend`] and fails selected groups of operations on
//! demand, so pipeline stages can be tested against a misbehaving store.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::backend::{EntityStore, HealthStatus};
use super::error::{StorageError, StorageResult};
use super::memory::MemoryBackend;
use super::schema::{Event, Indication, IndicationStatus, Limitation, Sensor};

#[derive(Debug, Default)]
pub struct FaultyStore {
    pub inner: MemoryBackend,
    pub fail_reads: AtomicBool,
    pub fail_indication_writes: AtomicBool,
    pub fail_retention: AtomicBool,
    pub fail_events: AtomicBool,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(flag: &AtomicBool, what: &str) -> StorageResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StorageError::QueryFailed(format!("injected {what} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl EntityStore for FaultyStore {
    async fn get_sensor(&self, id: i64) -> StorageResult<Option<Sensor>> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.get_sensor(id).await
    }

    async fn create_sensor(
        &self,
        room_id: i64,
        sensor_type: &str,
        active: bool,
    ) -> StorageResult<Sensor> {
        self.inner.create_sensor(room_id, sensor_type, active).await
    }

    async fn get_limitation(
        &self,
        sensor_type: &str,
        room_id: i64,
    ) -> StorageResult<Option<Limitation>> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.get_limitation(sensor_type, room_id).await
    }

    async fn set_limitation(&self, limitation: Limitation) -> StorageResult<()> {
        self.inner.set_limitation(limitation).await
    }

    async fn list_indications(
        &self,
        sensor_id: i64,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<Indication>> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.list_indications(sensor_id, since).await
    }

    async fn count_indications_older_than(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        Self::check(&self.fail_retention, "retention")?;
        self.inner.count_indications_older_than(cutoff).await
    }

    async fn delete_indications_older_than(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        Self::check(&self.fail_retention, "retention")?;
        self.inner.delete_indications_older_than(cutoff).await
    }

    async fn create_indication(
        &self,
        sensor_id: i64,
        time: Option<DateTime<Utc>>,
        value: f64,
        status: IndicationStatus,
    ) -> StorageResult<Indication> {
        Self::check(&self.fail_indication_writes, "indication write")?;
        self.inner
            .create_indication(sensor_id, time, value, status)
            .await
    }

    async fn list_events(&self, sensor_id: i64) -> StorageResult<Vec<Event>> {
        Self::check(&self.fail_events, "event")?;
        self.inner.list_events(sensor_id).await
    }

    async fn open_event(&self, sensor_id: i64) -> StorageResult<Option<Event>> {
        Self::check(&self.fail_events, "event")?;
        self.inner.open_event(sensor_id).await
    }

    async fn create_event(
        &self,
        sensor_id: i64,
        time: Option<DateTime<Utc>>,
        eliminated: bool,
        description: &str,
    ) -> StorageResult<Event> {
        Self::check(&self.fail_events, "event")?;
        self.inner
            .create_event(sensor_id, time, eliminated, description)
            .await
    }

    async fn eliminate_event(&self, sensor_id: i64, time: DateTime<Utc>) -> StorageResult<bool> {
        self.inner.eliminate_event(sensor_id, time).await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        self.inner.health_check().await
    }

    async fn get_stats(&self) -> StorageResult<String> {
        self.inner.get_stats().await
    }

    async fn close(&self) -> StorageResult<()> {
        self.inner.close().await
    }
}
