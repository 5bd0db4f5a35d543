//! The reading ingestion pipeline
//!
//! ## Pipeline
//!
//! ```text
//! ingest(sensor, value)
//!   1. classify     sensor + limitation lookup, trend forecast, status
//!   2. record       persist the indication with its status
//!   3. retention    delete old indications (at most once per hour)
//!   4. curate       open an event if the value itself is out of bounds
//! ```
//!
//! Step 1 only reads. If it fails the call returns `Err` and nothing has
//! been written.
//!
//! Steps 2-4 are independent units of work against the store. A failure in
//! one of them is logged and recorded in the [`IngestReport`], the remaining
//! steps still run, and nothing already written is undone. A recorded
//! reading is never lost because cleanup or event bookkeeping failed.

pub mod classifier;
pub mod curator;
pub mod error;
pub mod forecast;
pub mod retention;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, instrument, warn};

pub use classifier::{Classification, LimitClassifier};
pub use curator::{Curation, EventCurator};
pub use error::MonitoringError;
pub use forecast::TrendForecaster;
pub use retention::{RetentionSweeper, Sweep};

use crate::clock::{Clock, SystemClock};
use crate::config::MonitoringConfig;
use crate::storage::{EntityStore, Event, Indication, IndicationStatus, StorageError};

/// Outcome of persisting the indication (step 2)
#[derive(Debug)]
pub enum IndicationOutcome {
    Recorded(Indication),
    Failed(StorageError),
}

/// Outcome of the retention sweep (step 3)
#[derive(Debug)]
pub enum SweepOutcome {
    Throttled,
    Swept { deleted: u64 },
    Failed(StorageError),
}

/// Outcome of event curation (step 4)
#[derive(Debug)]
pub enum CurationOutcome {
    /// The measured value was within bounds
    NotRequired,
    AlreadyOpen(Event),
    Opened(Event),
    Failed(StorageError),
}

/// Result of a single `ingest` call
#[derive(Debug)]
pub struct IngestReport {
    pub sensor_id: i64,
    pub time: DateTime<Utc>,
    pub status: IndicationStatus,
    pub indication: IndicationOutcome,
    pub retention: SweepOutcome,
    pub event: CurationOutcome,
}

impl IngestReport {
    /// Was the reading persisted?
    pub fn is_recorded(&self) -> bool {
        matches!(self.indication, IndicationOutcome::Recorded(_))
    }

    /// Did any stage after classification fail?
    pub fn is_degraded(&self) -> bool {
        matches!(self.indication, IndicationOutcome::Failed(_))
            || matches!(self.retention, SweepOutcome::Failed(_))
            || matches!(self.event, CurationOutcome::Failed(_))
    }

    /// The event opened by this reading, if any
    pub fn opened_event(&self) -> Option<&Event> {
        match &self.event {
            CurationOutcome::Opened(event) => Some(event),
            _ => None,
        }
    }
}

impl fmt::Display for IndicationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicationOutcome::Recorded(_) => write!(f, "recorded"),
            IndicationOutcome::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

impl fmt::Display for SweepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepOutcome::Throttled => write!(f, "throttled"),
            SweepOutcome::Swept { deleted } => write!(f, "swept {deleted}"),
            SweepOutcome::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

impl fmt::Display for CurationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurationOutcome::NotRequired => write!(f, "not_required"),
            CurationOutcome::AlreadyOpen(_) => write!(f, "already_open"),
            CurationOutcome::Opened(_) => write!(f, "opened"),
            CurationOutcome::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Entry point of the pipeline
///
/// A `Monitor` is `Send + Sync` and meant to be shared (e.g. in an `Arc`)
/// by all callers of one process. Its only mutable state is the retention
/// throttle; everything else lives in the store.
///
/// Concurrent readings for the *same* sensor race on the open-event check.
/// The SQLite store rejects the second open event, which the curator
/// reports as `AlreadyOpen`; other stores rely on callers serializing
/// readings per sensor.
pub struct Monitor {
    store: Arc<dyn EntityStore>,
    clock: Arc<dyn Clock>,
    classifier: LimitClassifier,
    sweeper: RetentionSweeper,
    curator: EventCurator,
}

impl Monitor {
    pub fn new(store: Arc<dyn EntityStore>, config: &MonitoringConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn EntityStore>,
        config: &MonitoringConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let forecaster = TrendForecaster::new(
            Duration::hours(config.forecast_horizon_hours as i64),
            config.forecast_steps,
        );

        debug!(
            "creating monitor (retention: {}h, horizon: {}h, steps: {})",
            config.retention_hours, config.forecast_horizon_hours, config.forecast_steps
        );

        Self {
            store,
            clock,
            classifier: LimitClassifier::new(forecaster),
            sweeper: RetentionSweeper::new(Duration::hours(config.retention_hours as i64)),
            curator: EventCurator,
        }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn sweeper(&self) -> &RetentionSweeper {
        &self.sweeper
    }

    /// Ingest one reading of `sensor_id`
    ///
    /// Returns `Err` only if the reading could not be classified, in which
    /// case nothing was written. Otherwise the report carries the status and
    /// the outcome of every later stage.
    #[instrument(skip(self))]
    pub async fn ingest(&self, sensor_id: i64, value: f64) -> Result<IngestReport, MonitoringError> {
        if !value.is_finite() {
            return Err(MonitoringError::InvalidValue { sensor_id, value });
        }

        let now = self.clock.now();
        let store = self.store.as_ref();

        let classification = self
            .classifier
            .classify(store, sensor_id, value, now)
            .await?;

        let indication = match store
            .create_indication(sensor_id, Some(now), value, classification.status)
            .await
        {
            Ok(indication) => IndicationOutcome::Recorded(indication),
            Err(e) => {
                error!("sensor {sensor_id}: failed to record indication: {e}");
                IndicationOutcome::Failed(e)
            }
        };

        let retention = match self.sweeper.sweep(store, now).await {
            Ok(Sweep::Throttled) => SweepOutcome::Throttled,
            Ok(Sweep::Swept { deleted, .. }) => SweepOutcome::Swept { deleted },
            Err(e) => {
                warn!("retention sweep failed: {e}");
                SweepOutcome::Failed(e)
            }
        };

        let event = if classification.current_violation {
            match self.curator.curate(store, &classification, value, now).await {
                Ok(Curation::Opened(event)) => CurationOutcome::Opened(event),
                Ok(Curation::AlreadyOpen(event)) => CurationOutcome::AlreadyOpen(event),
                Err(e) => {
                    warn!("sensor {sensor_id}: failed to record event: {e}");
                    CurationOutcome::Failed(e)
                }
            }
        } else {
            CurationOutcome::NotRequired
        };

        let report = IngestReport {
            sensor_id,
            time: now,
            status: classification.status,
            indication,
            retention,
            event,
        };

        info!(
            "sensor {sensor_id}: {value} -> {} (indication: {}, retention: {}, event: {})",
            report.status, report.indication, report.retention, report.event
        );

        Ok(report)
    }
}
