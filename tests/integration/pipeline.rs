//! End-to-end tests of the ingestion pipeline against the in-memory store
//!
//! These tests verify that:
//! - Readings are classified and persisted with their status
//! - Trend forecasts include the new reading
//! - Sustained violations produce exactly one open event
//! - Retention removes only indications outside the window

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, Duration, Utc};
use pretty_assertions::assert_eq;
use sensor_monitoring::{
    MonitoringError,
    clock::ManualClock,
    monitoring::{CurationOutcome, SweepOutcome},
    storage::{EntityStore, IndicationStatus, memory::MemoryBackend},
};

use crate::helpers::*;

#[tokio::test]
async fn test_exceeding_value_opens_event() {
    let store = Arc::new(MemoryBackend::new());
    let sensor_id = create_sensor_with_limits(store.as_ref(), 10, 40).await;
    let monitor = create_monitor(store.clone(), Arc::new(ManualClock::new(start_time())));

    let report = monitor.ingest(sensor_id, 45.0).await.unwrap();
    assert_eq!(report.status, IndicationStatus::Exceeded);

    let events = store.list_events(sensor_id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert!(!events[0].eliminated);
    assert!(events[0].description.contains('>'));
    assert!(events[0].description.contains("40"));

    let indications = store
        .list_indications(sensor_id, DateTime::<Utc>::MIN_UTC)
        .await
        .unwrap();
    assert_eq!(indications.len(), 1);
    assert_eq!(indications[0].value, 45.0);
    assert_eq!(indications[0].status, IndicationStatus::Exceeded);
}

#[tokio::test]
async fn test_missing_limitation_writes_nothing() {
    let store = Arc::new(MemoryBackend::new());
    let sensor = store.create_sensor(1, "co2", true).await.unwrap();
    let monitor = create_monitor(store.clone(), Arc::new(ManualClock::new(start_time())));

    let result = monitor.ingest(sensor.id, 800.0).await;
    assert_matches!(result, Err(MonitoringError::ConfigurationMissing { .. }));

    let indications = store
        .list_indications(sensor.id, DateTime::<Utc>::MIN_UTC)
        .await
        .unwrap();
    assert!(indications.is_empty());
    assert!(store.list_events(sensor.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rising_trend_is_possible_exceedance() {
    let store = Arc::new(MemoryBackend::new());
    let sensor_id = create_sensor_with_limits(store.as_ref(), 10, 40).await;
    let now = start_time();

    // 10 readings one minute apart, rising by 0.5, the last one at 25.5
    for i in 0..10 {
        store
            .create_indication(
                sensor_id,
                Some(now - Duration::minutes(10 - i)),
                21.0 + 0.5 * i as f64,
                IndicationStatus::Normal,
            )
            .await
            .unwrap();
    }

    let monitor = create_monitor(store.clone(), Arc::new(ManualClock::new(now)));
    let classification = sensor_monitoring::monitoring::LimitClassifier::default()
        .classify(store.as_ref(), sensor_id, 26.0, now)
        .await
        .unwrap();
    assert_eq!(classification.projection, 56.0);

    let report = monitor.ingest(sensor_id, 26.0).await.unwrap();
    assert_eq!(report.status, IndicationStatus::PossibleExceedance);
    assert_matches!(report.event, CurationOutcome::NotRequired);
}

#[tokio::test]
async fn test_sustained_violation_is_deduplicated() {
    let store = Arc::new(MemoryBackend::new());
    let sensor_id = create_sensor_with_limits(store.as_ref(), 10, 40).await;
    let clock = Arc::new(ManualClock::new(start_time()));
    let monitor = create_monitor(store.clone(), clock.clone());

    let first = monitor.ingest(sensor_id, 45.0).await.unwrap();
    assert_matches!(first.event, CurationOutcome::Opened(_));

    clock.advance(Duration::minutes(1));
    let second = monitor.ingest(sensor_id, 46.0).await.unwrap();
    assert_matches!(second.event, CurationOutcome::AlreadyOpen(_));

    assert_eq!(store.list_events(sensor_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_eliminated_event_reopens_on_next_violation() {
    let store = Arc::new(MemoryBackend::new());
    let sensor_id = create_sensor_with_limits(store.as_ref(), 10, 40).await;
    let clock = Arc::new(ManualClock::new(start_time()));
    let monitor = create_monitor(store.clone(), clock.clone());

    let first = monitor.ingest(sensor_id, 45.0).await.unwrap();
    let opened = first.opened_event().unwrap().clone();
    assert!(store.eliminate_event(sensor_id, opened.time).await.unwrap());

    clock.advance(Duration::minutes(1));
    let second = monitor.ingest(sensor_id, 5.0).await.unwrap();
    let reopened = second.opened_event().unwrap();
    assert!(reopened.description.contains('<'));
    assert!(reopened.description.contains("10"));

    let events = store.list_events(sensor_id).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events.iter().filter(|e| e.is_open()).count(), 1);
}

#[tokio::test]
async fn test_back_in_bounds_keeps_event_open() {
    let store = Arc::new(MemoryBackend::new());
    let sensor_id = create_sensor_with_limits(store.as_ref(), 10, 40).await;
    let clock = Arc::new(ManualClock::new(start_time()));
    let monitor = create_monitor(store.clone(), clock.clone());

    monitor.ingest(sensor_id, 45.0).await.unwrap();
    clock.advance(Duration::minutes(30));
    let report = monitor.ingest(sensor_id, 20.0).await.unwrap();

    // closing events is an external concern
    assert_matches!(report.event, CurationOutcome::NotRequired);
    assert!(store.open_event(sensor_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_retention_window_and_throttle() {
    let store = Arc::new(MemoryBackend::new());
    let sensor_id = create_sensor_with_limits(store.as_ref(), 10, 40).await;
    let now = start_time();

    store
        .create_indication(sensor_id, Some(now - Duration::hours(25)), 18.0, IndicationStatus::Normal)
        .await
        .unwrap();
    store
        .create_indication(sensor_id, Some(now - Duration::hours(1)), 19.0, IndicationStatus::Normal)
        .await
        .unwrap();

    let clock = Arc::new(ManualClock::new(now));
    let monitor = create_monitor(store.clone(), clock.clone());

    let report = monitor.ingest(sensor_id, 20.0).await.unwrap();
    assert_matches!(report.retention, SweepOutcome::Swept { deleted: 1 });

    let remaining = store
        .list_indications(sensor_id, DateTime::<Utc>::MIN_UTC)
        .await
        .unwrap();
    let values: Vec<f64> = remaining.iter().map(|i| i.value).collect();
    assert_eq!(values, vec![19.0, 20.0]);

    // same clock hour: throttled, even though another old row appeared
    store
        .create_indication(sensor_id, Some(now - Duration::hours(48)), 1.0, IndicationStatus::Normal)
        .await
        .unwrap();
    clock.advance(Duration::minutes(10));
    let report = monitor.ingest(sensor_id, 20.0).await.unwrap();
    assert_matches!(report.retention, SweepOutcome::Throttled);
    assert_eq!(
        store.count_indications_older_than(now - Duration::hours(24)).await.unwrap(),
        1
    );

    // next clock hour sweeps again
    clock.advance(Duration::minutes(30));
    let report = monitor.ingest(sensor_id, 20.0).await.unwrap();
    assert_matches!(report.retention, SweepOutcome::Swept { deleted: 1 });
}

#[tokio::test]
async fn test_independent_monitors_throttle_independently() {
    let store = Arc::new(MemoryBackend::new());
    let sensor_id = create_sensor_with_limits(store.as_ref(), 10, 40).await;
    let clock = Arc::new(ManualClock::new(start_time()));

    let first = create_monitor(store.clone(), clock.clone());
    let second = create_monitor(store.clone(), clock.clone());

    let report = first.ingest(sensor_id, 20.0).await.unwrap();
    assert_matches!(report.retention, SweepOutcome::Swept { .. });

    clock.advance(Duration::seconds(1));
    let report = second.ingest(sensor_id, 20.0).await.unwrap();
    assert_matches!(report.retention, SweepOutcome::Swept { .. });

    clock.advance(Duration::seconds(1));
    let report = first.ingest(sensor_id, 20.0).await.unwrap();
    assert_matches!(report.retention, SweepOutcome::Throttled);
}
