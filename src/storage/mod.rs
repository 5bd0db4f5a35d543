//! Entity stores for sensors, limitations, indications and events
//!
//! This module provides a trait-based abstraction over the persistent
//! entity store consumed by the monitoring pipeline.
//!
//! ## Design
//!
//! - **Trait-based**: `EntityStore` allows swapping implementations
//! - **Async**: All operations are async for compatibility with Tokio
//! - **Typed**: Every table has a matching struct in [`schema`]
//!
//! ## Backends
//!
//! - **SQLite** (default): Embedded database with migrations
//! - **In-Memory**: No persistence, for testing or `"backend": "none"`
//!
//! ## Usage
//!
//! ```no_run
//! use sensor_monitoring::storage::{EntityStore, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::new("./monitoring.db").await?;
//!     let sensor = backend.create_sensor(1, "temperature", true).await?;
//!     println!("registered sensor {}", sensor.id);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
#[cfg(test)]
pub(crate) mod faulty;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{EntityStore, HealthStatus};
pub use error::{StorageError, StorageResult};
pub use schema::{Event, Indication, IndicationStatus, Limitation, Sensor};
