// tests/redis_live.rs
//
// Runs against a real Redis only when SLOT_TRACKER_TEST_REDIS_URL is set,
// e.g. SLOT_TRACKER_TEST_REDIS_URL=redis://127.0.0.1:6379/15
// Keys go under a per-run prefix and are left to expire.

use chrono::{DateTime, Duration, Utc};
use slot_notify_tracker::{SlotNotificationTracker, TrackerConfig};

const ENV_TEST_URL: &str = "SLOT_TRACKER_TEST_REDIS_URL";

async fn live_tracker() -> Option<SlotNotificationTracker> {
    let url = std::env::var(ENV_TEST_URL).ok()?;
    let mut cfg = TrackerConfig::with_url(url);
    cfg.key_prefix = format!("test_notified_slot_{}:", Utc::now().timestamp_millis());
    Some(SlotNotificationTracker::connect(&cfg).await.expect("live redis reachable"))
}

#[tokio::test]
async fn live_mark_check_count() {
    let Some(tracker) = live_tracker().await else {
        eprintln!("{ENV_TEST_URL} not set; skipping");
        return;
    };
    let slot: DateTime<Utc> = "2025-06-01T21:00:00Z".parse().unwrap();

    assert!(!tracker.is_notified("bethpage_black", slot).await.unwrap());
    tracker
        .mark_notified("bethpage_black", slot, Duration::seconds(60))
        .await
        .unwrap();
    tracker
        .mark_notified("bethpage_black", slot, Duration::seconds(60))
        .await
        .unwrap();
    assert!(tracker.is_notified("bethpage_black", slot).await.unwrap());
    assert_eq!(tracker.count_live_entries().await.unwrap(), 1);

    let stats = tracker.stats().await.unwrap();
    assert_eq!(stats.backend.kind, "redis");
    assert!(stats.backend.version.is_some());
}

#[tokio::test]
async fn live_short_ttl_expires() {
    let Some(tracker) = live_tracker().await else {
        return;
    };
    let slot: DateTime<Utc> = "2025-06-01T22:00:00Z".parse().unwrap();
    tracker
        .mark_notified("court_9", slot, Duration::milliseconds(200))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    assert!(!tracker.is_notified("court_9", slot).await.unwrap());
}
