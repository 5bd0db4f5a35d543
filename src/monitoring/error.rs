use crate::storage::StorageError;

/// Failures that abort an `ingest` call before anything is written
#[derive(Debug, thiserror::Error)]
pub enum MonitoringError {
    #[error("sensor {sensor_id} not found")]
    NotFound { sensor_id: i64 },

    #[error(
        "no limitation configured for sensor {sensor_id} (type: {sensor_type}, room: {room_id})"
    )]
    ConfigurationMissing {
        sensor_id: i64,
        sensor_type: String,
        room_id: i64,
    },

    #[error("reading {value} for sensor {sensor_id} is not a finite number")]
    InvalidValue { sensor_id: i64, value: f64 },

    /// The store failed while the reading was being classified
    #[error(transparent)]
    Storage(#[from] StorageError),
}
