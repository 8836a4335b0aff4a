// tests/api_http.rs
//
// HTTP-level tests for the diagnostics Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health (up and down)
// - GET /stats
// - POST /admin/sweep

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use slot_notify_tracker::api::{self, AppState};
use slot_notify_tracker::{InMemoryStore, ManualClock, SlotNotificationTracker, TrackerOptions};

const BODY_LIMIT: usize = 1024 * 1024;

struct Harness {
    clock: Arc<ManualClock>,
    store: Arc<InMemoryStore>,
    tracker: Arc<SlotNotificationTracker>,
}

impl Harness {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()));
        let store = Arc::new(InMemoryStore::new(clock.clone()));
        let tracker = Arc::new(SlotNotificationTracker::new(
            store.clone(),
            clock.clone(),
            TrackerOptions::default(),
        ));
        Self { clock, store, tracker }
    }

    fn router(&self) -> Router {
        api::router(AppState {
            tracker: self.tracker.clone(),
        })
    }
}

fn slot(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

async fn body_string(resp: axum::response::Response) -> String {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

#[tokio::test]
async fn health_ok_then_503_when_backend_down() {
    let h = Harness::new();

    let resp = h
        .router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await.trim(), "OK");

    h.store.set_offline(true);
    let resp = h
        .router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn stats_returns_json_snapshot() {
    let h = Harness::new();
    h.tracker
        .mark_notified_default("bethpage_black", slot("2025-06-01T21:00:00Z"))
        .await
        .unwrap();

    let resp = h
        .router()
        .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let v: Json = serde_json::from_str(&body_string(resp).await).expect("stats json");
    assert_eq!(v["total_notified_slots"], 1);
    assert_eq!(v["backend_connected"], true);
    assert_eq!(v["backend"]["kind"], "memory");
    assert_eq!(v["key_prefix"], "notified_slot:");
}

#[tokio::test]
async fn stats_is_503_when_backend_down() {
    let h = Harness::new();
    h.store.set_offline(true);
    let resp = h
        .router()
        .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let v: Json = serde_json::from_str(&body_string(resp).await).unwrap();
    assert!(v["error"].as_str().unwrap().contains("unavailable"));
}

#[tokio::test]
async fn sweep_removes_old_entries() {
    let h = Harness::new();
    h.tracker
        .mark_notified("old", slot("2025-06-01T21:00:00Z"), Duration::days(30))
        .await
        .unwrap();
    h.clock.advance(Duration::days(10));
    h.tracker
        .mark_notified("fresh", slot("2025-06-12T21:00:00Z"), Duration::days(30))
        .await
        .unwrap();

    let resp = h
        .router()
        .oneshot(
            Request::post("/admin/sweep?days=7")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v: Json = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(v["removed"], 1);
    assert_eq!(v["older_than_days"], 7);
    assert_eq!(h.tracker.count_live_entries().await.unwrap(), 1);
}

#[tokio::test]
async fn sweep_rejects_negative_days() {
    let h = Harness::new();
    let resp = h
        .router()
        .oneshot(Request::post("/admin/sweep?days=-1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sweep_rejects_days_beyond_calendar_range() {
    let h = Harness::new();
    let resp = h
        .router()
        .oneshot(
            Request::post("/admin/sweep?days=200000000000000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // the router keeps serving after the rejected request
    let resp = h
        .router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
