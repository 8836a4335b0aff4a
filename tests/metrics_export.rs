// tests/metrics_export.rs
//
// The Prometheus exposition carries HELP text for every tracker series.

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Duration};
use slot_notify_tracker::metrics::Metrics;
use slot_notify_tracker::{InMemoryStore, SlotNotificationTracker, SystemClock, TrackerOptions};
use std::sync::Arc;
use tower::ServiceExt;

#[tokio::test]
async fn metrics_endpoint_describes_tracker_series() {
    let metrics = Metrics::init(Duration::days(7).num_seconds()).expect("install recorder");

    let clock = Arc::new(SystemClock);
    let store = Arc::new(InMemoryStore::new(clock.clone()));
    let tracker = SlotNotificationTracker::new(store, clock, TrackerOptions::default());
    let slot = DateTime::parse_from_rfc3339("2025-06-01T17:00:00-04:00").unwrap();
    tracker.mark_notified("bethpage_black", slot, Duration::days(7)).await.unwrap();
    assert!(tracker.is_notified("bethpage_black", slot).await.unwrap());

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    for series in [
        "slot_tracker_default_ttl_secs",
        "slot_tracker_marks_total",
        "slot_tracker_checks_total",
    ] {
        assert!(
            text.contains(&format!("# HELP {series}")),
            "missing HELP for {series}:\n{text}"
        );
    }
}
