//! Event curation for readings outside their bounds
//!
//! ## Open Event State Machine
//!
//! ```text
//! violation, no open event   → Opened (new event, eliminated = false)
//! violation, open event      → AlreadyOpen (no write)
//! event eliminated elsewhere → next violation opens a new event
//! ```
//!
//! This keeps at most one open event per sensor and prevents a sustained
//! violation from producing one event per reading.
//!
//! Events are keyed by `(sensor_id, time)`. If an eliminated event already
//! holds the key of a new violation, the new event is placed 1 ms later.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument};

use super::classifier::Classification;
use crate::storage::{EntityStore, Event, StorageError, StorageResult};

/// What the curator did for a violating reading
#[derive(Debug, Clone, PartialEq)]
pub enum Curation {
    /// A new open event was recorded
    Opened(Event),

    /// The sensor already had an open event
    AlreadyOpen(Event),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EventCurator;

impl EventCurator {
    /// Make sure the sensor has an open event for this violation
    #[instrument(skip_all, fields(sensor_id = classification.sensor_id))]
    pub async fn curate(
        &self,
        store: &dyn EntityStore,
        classification: &Classification,
        value: f64,
        now: DateTime<Utc>,
    ) -> StorageResult<Curation> {
        let sensor_id = classification.sensor_id;

        if let Some(open) = store.open_event(sensor_id).await? {
            debug!("sensor {sensor_id}: violation already tracked since {}", open.time);
            return Ok(Curation::AlreadyOpen(open));
        }

        let description = describe_violation(classification, value);
        match store
            .create_event(sensor_id, Some(now), false, &description)
            .await
        {
            Ok(event) => {
                info!("sensor {sensor_id}: opened event: {description}");
                Ok(Curation::Opened(event))
            }
            // another writer opened an event between our read and insert
            Err(StorageError::Conflict(reason)) => match store.open_event(sensor_id).await? {
                Some(open) => Ok(Curation::AlreadyOpen(open)),
                None => {
                    // an eliminated event already occupies (sensor, now)
                    debug!("sensor {sensor_id}: event time {now} taken ({reason}), retrying 1 ms later");
                    let event = store
                        .create_event(
                            sensor_id,
                            Some(now + Duration::milliseconds(1)),
                            false,
                            &description,
                        )
                        .await?;
                    info!("sensor {sensor_id}: opened event: {description}");
                    Ok(Curation::Opened(event))
                }
            },
            Err(e) => Err(e),
        }
    }
}

/// Human-readable description of a violation
///
/// Uses `<` for values below the minimum and `>` otherwise.
pub fn describe_violation(classification: &Classification, value: f64) -> String {
    let comparison = if value < classification.min as f64 {
        "<"
    } else {
        ">"
    };

    format!(
        "{} = {} {} allowed range [{}, {}]",
        classification.sensor_type, value, comparison, classification.min, classification.max
    )
}
