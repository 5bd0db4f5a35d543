//! Sensor reading ingestion with limit classification, trend forecasting,
//! violation events and timed retention.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sensor_monitoring::{Monitor, config::MonitoringConfig, storage::memory::MemoryBackend};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let monitor = Monitor::new(Arc::new(MemoryBackend::new()), &MonitoringConfig::default());
//! let report = monitor.ingest(1, 23.5).await?;
//! println!("status: {}", report.status);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod monitoring;
pub mod storage;
pub mod util;

use std::sync::Arc;

pub use monitoring::{IngestReport, Monitor, MonitoringError};

use config::StorageConfig;
use storage::{EntityStore, memory::MemoryBackend};

/// Open the entity store described by `config`
pub async fn open_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn EntityStore>> {
    match config {
        StorageConfig::None => Ok(Arc::new(MemoryBackend::new())),
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => {
            let backend = storage::sqlite::SqliteBackend::new(path).await?;
            Ok(Arc::new(backend))
        }
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => Err(anyhow::anyhow!(
            "SQLite storage requested, but the storage-sqlite feature is disabled"
        )),
    }
}
