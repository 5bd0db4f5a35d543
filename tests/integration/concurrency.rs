//! Concurrent ingestion through a shared monitor
//!
//! These tests verify that:
//! - One `Monitor` can be shared across tasks
//! - Readings of different sensors do not interfere
//! - A shared monitor sweeps at most once per hour

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sensor_monitoring::{
    Monitor,
    clock::ManualClock,
    monitoring::{CurationOutcome, SweepOutcome},
    storage::{EntityStore, Limitation, memory::MemoryBackend},
};

use crate::helpers::*;

async fn create_sensors(store: &dyn EntityStore, count: i64) -> Vec<i64> {
    let mut ids = Vec::new();
    for room_id in 0..count {
        let sensor = store.create_sensor(room_id, "co2", true).await.unwrap();
        store
            .set_limitation(Limitation {
                sensor_type: "co2".to_string(),
                room_id,
                max: 1000,
                min: 0,
            })
            .await
            .unwrap();
        ids.push(sensor.id);
    }
    ids
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sensors_each_open_one_event() {
    let store = Arc::new(MemoryBackend::new());
    let sensors = create_sensors(store.as_ref(), 8).await;
    let monitor = Arc::new(create_monitor(
        store.clone(),
        Arc::new(ManualClock::new(start_time())),
    ));

    let mut handles = Vec::new();
    for sensor_id in sensors.clone() {
        let monitor = monitor.clone();
        handles.push(tokio::spawn(async move {
            monitor.ingest(sensor_id, 1500.0).await
        }));
    }

    let mut opened = 0;
    let mut swept = 0;
    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        assert!(report.is_recorded());
        if matches!(report.event, CurationOutcome::Opened(_)) {
            opened += 1;
        }
        if matches!(report.retention, SweepOutcome::Swept { .. }) {
            swept += 1;
        }
    }

    assert_eq!(opened, sensors.len());
    assert_eq!(swept, 1);

    for sensor_id in sensors {
        let events = store.list_events(sensor_id).await.unwrap();
        assert_eq!(events.len(), 1);
        let indications = store
            .list_indications(sensor_id, DateTime::<Utc>::MIN_UTC)
            .await
            .unwrap();
        assert_eq!(indications.len(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_serialized_readings_per_sensor_keep_one_open_event() {
    let store = Arc::new(MemoryBackend::new());
    let sensors = create_sensors(store.as_ref(), 4).await;

    // every task owns one sensor and feeds it readings in order
    let mut handles = Vec::new();
    for sensor_id in sensors.clone() {
        let clock = Arc::new(ManualClock::new(start_time()));
        let monitor: Monitor = create_monitor(store.clone(), clock.clone());
        handles.push(tokio::spawn(async move {
            let mut reports = Vec::new();
            for minute in 0..5 {
                let value = if minute % 2 == 0 { 1200.0 } else { 500.0 };
                reports.push(monitor.ingest(sensor_id, value).await.unwrap());
                clock.advance(Duration::minutes(1));
            }
            reports
        }));
    }

    for handle in handles {
        let reports = handle.await.unwrap();
        let opened = reports
            .iter()
            .filter(|report| report.opened_event().is_some())
            .count();
        assert_eq!(opened, 1);
        assert!(reports.iter().all(|report| report.is_recorded()));
    }

    for sensor_id in sensors {
        let events = store.list_events(sensor_id).await.unwrap();
        assert_eq!(events.iter().filter(|event| event.is_open()).count(), 1);
    }
}
