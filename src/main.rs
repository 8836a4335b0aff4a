//! Slot tracker diagnostics server: binary entrypoint.
//! Connects the notification tracker (fatal if the store is unreachable)
//! and serves `/health`, `/stats`, `/admin/sweep` and `/metrics`.

use std::sync::Arc;

use anyhow::Context;
use slot_notify_tracker::api::{self, AppState};
use slot_notify_tracker::metrics::Metrics;
use slot_notify_tracker::{init_tracing, SlotNotificationTracker, TrackerConfig};

const ENV_HTTP_ADDR: &str = "SLOT_TRACKER_HTTP_ADDR";
const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = TrackerConfig::from_env().context("loading tracker config")?;
    // Recorder first, so series described by the tracker land in it.
    let metrics = Metrics::init(cfg.default_ttl.num_seconds())?;
    let tracker = SlotNotificationTracker::connect(&cfg)
        .await
        .context("connecting notification tracker")?;

    let state = AppState {
        tracker: Arc::new(tracker),
    };
    let app = api::router(state).merge(metrics.router());

    let addr = std::env::var(ENV_HTTP_ADDR).unwrap_or_else(|_| DEFAULT_HTTP_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "diagnostics server listening");

    axum::serve(listener, app).await.context("http server")?;
    Ok(())
}
