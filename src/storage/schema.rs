//! Entity definitions persisted by the storage backends
//!
//! ## Keys
//!
//! - `Sensor` is keyed by its numeric id
//! - `Limitation` is keyed by `(sensor_type, room_id)`
//! - `Indication` and `Event` are keyed by `(sensor_id, time)`
//!
//! Timestamps are always UTC. The SQLite backend stores them as Unix
//! milliseconds, so two rows for the same sensor within the same
//! millisecond share a key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A physical sensor mounted in a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: i64,

    /// Room the sensor is mounted in
    pub room_id: i64,

    /// Free-text category, e.g. "temperature" or "humidity"
    pub sensor_type: String,

    /// Informational only; inactive sensors are still ingested
    pub active: bool,
}

/// Operating bounds for all sensors of one type in one room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limitation {
    pub sensor_type: String,
    pub room_id: i64,
    pub max: i64,
    pub min: i64,
}

impl Limitation {
    /// Strict bound check: values equal to `min` or `max` are in bounds
    pub fn is_violated_by(&self, value: f64) -> bool {
        value < self.min as f64 || value > self.max as f64
    }
}

/// Status derived for a single reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicationStatus {
    /// The measured value is outside the configured bounds
    Exceeded,

    /// The measured value is fine, but the forecast leaves the bounds
    PossibleExceedance,

    /// Both the measured value and the forecast are within bounds
    Normal,
}

impl std::fmt::Display for IndicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndicationStatus::Exceeded => write!(f, "exceeded"),
            IndicationStatus::PossibleExceedance => write!(f, "possible_exceedance"),
            IndicationStatus::Normal => write!(f, "normal"),
        }
    }
}

impl std::str::FromStr for IndicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exceeded" => Ok(IndicationStatus::Exceeded),
            "possible_exceedance" => Ok(IndicationStatus::PossibleExceedance),
            "normal" => Ok(IndicationStatus::Normal),
            other => Err(format!("unknown indication status: {other}")),
        }
    }
}

/// A single stored reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indication {
    pub sensor_id: i64,
    pub time: DateTime<Utc>,
    pub value: f64,
    pub status: IndicationStatus,
}

/// A violation record on the event timeline of a sensor
///
/// An event with `eliminated == false` is *open*. At most one open event
/// exists per sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub sensor_id: i64,
    pub time: DateTime<Utc>,
    pub eliminated: bool,
    pub description: String,
}

impl Event {
    pub fn is_open(&self) -> bool {
        !self.eliminated
    }
}
