//! End-to-end flow through the public API: local wall-clock input, series
//! materialization, exception handling, and cleanup.

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use ulid::Ulid;

use reserva::{
    BookingRequest, Engine, EngineError, FixedClock, MemoryStore, NotifyHub, Recurrence,
    RecurrenceFreq, SeriesStatus, TzConverter,
};

fn engine() -> Engine {
    let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    Engine::new(
        Arc::new(MemoryStore::new()),
        Arc::new(FixedClock(now)),
        Arc::new(NotifyHub::new()),
    )
}

#[tokio::test]
async fn local_series_booked_excepted_and_deleted() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let engine = engine();
    let tz = TzConverter::new(chrono_tz::Europe::Berlin);
    let resource = Ulid::new();

    // The caller works in Berlin wall-clock time; the engine only ever sees UTC.
    let start_local = NaiveDate::from_ymd_opt(2025, 1, 6)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();
    let end_local = NaiveDate::from_ymd_opt(2025, 1, 6)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap();
    let anchor = tz.span_to_utc(start_local, end_local).unwrap();
    let until = tz
        .to_utc(
            NaiveDate::from_ymd_opt(2025, 1, 27)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        )
        .unwrap();

    let series = engine
        .book(BookingRequest {
            resource_id: resource,
            owner_id: "membership-desk".into(),
            start: anchor.start,
            end: anchor.end,
            purpose: "weekly onboarding".into(),
            recurrence: Some(Recurrence {
                freq: RecurrenceFreq::Weekly,
                interval: 1,
                until,
            }),
        })
        .await
        .unwrap();
    assert_eq!(series.len(), 4);
    let head_id = series[0].id;

    // Berlin is UTC+1 in January: 09:00 local is stored as 08:00 UTC.
    assert_eq!(
        series[0].span.start,
        Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap()
    );
    // Display conversion restores the wall clock.
    assert_eq!(tz.format_input(series[0].span.start), "2025-01-06T09:00");

    // A competing booking over an occurrence is refused with detail.
    let clash = engine
        .book(BookingRequest {
            resource_id: resource,
            owner_id: "walk-in".into(),
            start: Utc.with_ymd_and_hms(2025, 1, 13, 8, 30, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 1, 13, 9, 30, 0).unwrap(),
            purpose: "tour".into(),
            recurrence: None,
        })
        .await;
    assert!(matches!(clash, Err(EngineError::Conflict(_))));

    // Skip one week without touching siblings.
    engine
        .add_exception(head_id, series[2].span.start)
        .await
        .unwrap();
    assert_eq!(
        engine.series_status(head_id).await.unwrap(),
        SeriesStatus::PartiallyCancelled
    );

    // The freed week is bookable again.
    engine
        .book(BookingRequest {
            resource_id: resource,
            owner_id: "walk-in".into(),
            start: series[2].span.start,
            end: series[2].span.end,
            purpose: "tour".into(),
            recurrence: None,
        })
        .await
        .unwrap();

    // Administrative teardown: children removed, head left to its owner.
    let removed = engine.bulk_delete(head_id).await.unwrap();
    assert_eq!(removed, 3);
    assert_eq!(
        engine.series_status(head_id).await.unwrap(),
        SeriesStatus::Deleted
    );
    assert!(engine.get_reservation(head_id).await.unwrap().is_some());
}
