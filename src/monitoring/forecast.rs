//! Short-horizon linear trend forecast
//!
//! The forecast takes the readings of the last few hours plus the new
//! value, averages the consecutive deltas and extrapolates that average a
//! fixed number of steps past the newest value. With one reading per
//! minute, 60 steps approximate "one hour ahead".

use chrono::{DateTime, Duration, Utc};
use tracing::trace;

use crate::storage::{EntityStore, StorageResult};
use crate::util::round2;

/// Default lookback window
pub const DEFAULT_HORIZON_HOURS: i64 = 3;

/// Default number of extrapolated steps
pub const DEFAULT_STEPS: u32 = 60;

#[derive(Debug, Clone, Copy)]
pub struct TrendForecaster {
    horizon: Duration,
    steps: u32,
}

impl Default for TrendForecaster {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_HORIZON_HOURS), DEFAULT_STEPS)
    }
}

impl TrendForecaster {
    pub fn new(horizon: Duration, steps: u32) -> Self {
        Self { horizon, steps }
    }

    pub fn horizon(&self) -> Duration {
        self.horizon
    }

    /// Project `value` forward using the sensor's readings since `now - horizon`
    pub async fn forecast(
        &self,
        store: &dyn EntityStore,
        sensor_id: i64,
        value: f64,
        now: DateTime<Utc>,
    ) -> StorageResult<f64> {
        let since = now
            .checked_sub_signed(self.horizon)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let history = store.list_indications(sensor_id, since).await?;

        let mut values: Vec<f64> = history.iter().map(|indication| indication.value).collect();
        values.push(value);

        let projection = extrapolate(&values, self.steps).unwrap_or(value);
        trace!(
            "sensor {sensor_id}: {} points in horizon, {value} -> {projection}",
            values.len()
        );
        Ok(projection)
    }
}

/// `last + mean(deltas) * steps`, rounded to two decimals
///
/// Returns `None` if there are fewer than two points.
pub fn extrapolate(values: &[f64], steps: u32) -> Option<f64> {
    let last = *values.last()?;
    if values.len() < 2 {
        return None;
    }

    let deltas: Vec<f64> = values.windows(2).map(|pair| pair[1] - pair[0]).collect();
    let average = deltas.iter().sum::<f64>() / deltas.len() as f64;

    Some(round2(last + average * steps as f64))
}
