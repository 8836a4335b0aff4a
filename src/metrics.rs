use axum::{routing::get, Router};
use metrics::{describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and publish the
    /// configured retention as a static gauge.
    pub fn init(default_ttl_secs: i64) -> anyhow::Result<Self> {
        static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();
        let handle = HANDLE
            .get_or_try_init(|| PrometheusBuilder::new().install_recorder())
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?
            .clone();

        describe_gauge!(
            "slot_tracker_default_ttl_secs",
            "Configured default retention of a notified slot, in seconds."
        );
        // Fixed expiry unless configured otherwise; this is the nominal TTL.
        gauge!("slot_tracker_default_ttl_secs").set(default_ttl_secs as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
