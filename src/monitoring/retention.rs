//! Throttled retention of old indications
//!
//! Every ingested reading offers the sweeper a chance to run, but it only
//! touches the store once per wall-clock hour. The marker of the last swept
//! hour lives in this struct, so each `Monitor` instance throttles on its
//! own; N instances sweep at most N times per hour.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument, trace};

use crate::clock::hour_of;
use crate::storage::{EntityStore, StorageResult};

/// Default retention window
pub const DEFAULT_RETENTION_HOURS: i64 = 24;

/// Result of a sweep attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    /// This hour was already swept
    Throttled,

    /// The sweep ran and deleted `deleted` indications older than `cutoff`
    Swept { deleted: u64, cutoff: DateTime<Utc> },
}

#[derive(Debug)]
pub struct RetentionSweeper {
    window: Duration,
    last_swept_hour: Mutex<Option<DateTime<Utc>>>,
}

impl Default for RetentionSweeper {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_RETENTION_HOURS))
    }
}

impl RetentionSweeper {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_swept_hour: Mutex::new(None),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// The hour of the last successful (or in-flight) sweep
    pub fn last_swept_hour(&self) -> Option<DateTime<Utc>> {
        *self.last_swept_hour.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Delete indications older than `now - window`, at most once per hour
    ///
    /// The hour is claimed before the store is touched, so concurrent
    /// callers on the same instance never sweep twice. A failed sweep
    /// releases the claim and the next call retries.
    #[instrument(skip(self, store))]
    pub async fn sweep(&self, store: &dyn EntityStore, now: DateTime<Utc>) -> StorageResult<Sweep> {
        let hour = hour_of(now);

        let previous = {
            let mut last = self.last_swept_hour.lock().unwrap_or_else(|e| e.into_inner());
            if *last == Some(hour) {
                trace!("retention already ran for hour {hour}");
                return Ok(Sweep::Throttled);
            }
            last.replace(hour)
        };

        let cutoff = now
            .checked_sub_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        match Self::delete_older_than(store, cutoff).await {
            Ok(deleted) => Ok(Sweep::Swept { deleted, cutoff }),
            Err(e) => {
                let mut last = self.last_swept_hour.lock().unwrap_or_else(|e| e.into_inner());
                if *last == Some(hour) {
                    *last = previous;
                }
                Err(e)
            }
        }
    }

    async fn delete_older_than(store: &dyn EntityStore, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        let count = store.count_indications_older_than(cutoff).await?;
        if count == 0 {
            debug!("no indications older than {cutoff}");
            return Ok(0);
        }

        let deleted = store.delete_indications_older_than(cutoff).await?;
        info!("deleted {deleted} indications older than {cutoff}");
        Ok(deleted)
    }
}
