// src/lib.rs
// Public library surface for binaries, integration tests and polling workers.

pub mod clock;
pub mod config;
pub mod error;
pub mod key;
pub mod stats;
pub mod store;
pub mod tracker;

// Polling-layer glue (filter, group, deliver, record)
pub mod openings;

// Diagnostics surface
pub mod api;
pub mod metrics;

// ---- Re-exports for stable public API ----
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::{ExpiryPolicy, TrackerConfig};
pub use crate::error::{EncodingError, TrackerError};
pub use crate::key::{parse_slot_time, SlotKey};
pub use crate::stats::{BackendInfo, TrackerStats};
pub use crate::store::{InMemoryStore, TtlStore, WriteMode};
pub use crate::tracker::{SlotNotificationTracker, TrackedEntry, TrackerOptions};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_JSON: &str = "SLOT_TRACKER_LOG_JSON";

/// Tracing setup shared by the binaries: `RUST_LOG` filter (default `info`),
/// compact output, or JSON lines when `SLOT_TRACKER_LOG_JSON=1`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(ENV_LOG_JSON).is_ok_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
