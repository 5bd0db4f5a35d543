//! Limit classification of a single reading
//!
//! ```text
//! value outside [min, max]                  → Exceeded
//! value inside, projection outside [min, max] → PossibleExceedance
//! both inside                               → Normal
//! ```
//!
//! Bounds are inclusive: a value equal to `min` or `max` is in bounds.

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use super::MonitoringError;
use super::forecast::TrendForecaster;
use crate::storage::{EntityStore, IndicationStatus, Limitation, Sensor};
use crate::util::round2;

/// Everything later pipeline stages need to know about a reading
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub sensor_id: i64,
    pub sensor_type: String,
    pub status: IndicationStatus,

    /// The measured value rounded to two decimals
    pub value: f64,
    pub projection: f64,
    pub current_violation: bool,
    pub projected_violation: bool,
    pub min: i64,
    pub max: i64,
}

impl Classification {
    /// Classify `value` and its `projection` against `limitation`
    pub fn evaluate(sensor: &Sensor, limitation: &Limitation, value: f64, projection: f64) -> Self {
        let current_violation = limitation.is_violated_by(value);
        let projected_violation = limitation.is_violated_by(projection);

        let status = if current_violation {
            IndicationStatus::Exceeded
        } else if projected_violation {
            IndicationStatus::PossibleExceedance
        } else {
            IndicationStatus::Normal
        };

        Self {
            sensor_id: sensor.id,
            sensor_type: sensor.sensor_type.clone(),
            status,
            value: round2(value),
            projection,
            current_violation,
            projected_violation,
            min: limitation.min,
            max: limitation.max,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LimitClassifier {
    forecaster: TrendForecaster,
}

impl LimitClassifier {
    pub fn new(forecaster: TrendForecaster) -> Self {
        Self { forecaster }
    }

    /// Look up the sensor and its limitation, forecast, and classify
    ///
    /// Performs reads only.
    #[instrument(skip(self, store, now))]
    pub async fn classify(
        &self,
        store: &dyn EntityStore,
        sensor_id: i64,
        value: f64,
        now: DateTime<Utc>,
    ) -> Result<Classification, MonitoringError> {
        let sensor = store
            .get_sensor(sensor_id)
            .await?
            .ok_or(MonitoringError::NotFound { sensor_id })?;

        let limitation = store
            .get_limitation(&sensor.sensor_type, sensor.room_id)
            .await?
            .ok_or_else(|| MonitoringError::ConfigurationMissing {
                sensor_id,
                sensor_type: sensor.sensor_type.clone(),
                room_id: sensor.room_id,
            })?;

        let projection = self
            .forecaster
            .forecast(store, sensor_id, value, now)
            .await?;

        let classification = Classification::evaluate(&sensor, &limitation, value, projection);
        debug!(
            "sensor {sensor_id}: {value} (forecast {projection}, bounds [{}, {}]) -> {}",
            limitation.min, limitation.max, classification.status
        );

        Ok(classification)
    }
}
