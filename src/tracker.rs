//! # Slot notification tracker
//! Remembers which `(resource, slot time)` pairs were already announced so a
//! polling loop does not re-notify the same opening every cycle.
//!
//! Entry lifecycle: `absent → present (mark_notified) → expired (ttl) → absent`.
//! Expiry is the backing store's job; this type never schedules anything.
//!
//! Two workers racing `is_notified` + `mark_notified` on one slot may both
//! see "not notified" and both notify; the entry ends up present either way.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{ExpiryPolicy, TrackerConfig};
use crate::error::{Result, TrackerError};
use crate::key::{SlotKey, DEFAULT_KEY_PREFIX};
use crate::stats::TrackerStats;
use crate::store::{connect_store, TtlStore, WriteMode};

/// Persisted value of one tracked slot. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntry {
    pub key: SlotKey,
    pub recorded_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Knobs that do not depend on which store is plugged in.
#[derive(Debug, Clone)]
pub struct TrackerOptions {
    pub key_prefix: String,
    pub default_ttl: Duration,
    pub expiry: ExpiryPolicy,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            default_ttl: Duration::days(crate::config::DEFAULT_TTL_DAYS),
            expiry: ExpiryPolicy::Fixed,
        }
    }
}

impl From<&TrackerConfig> for TrackerOptions {
    fn from(cfg: &TrackerConfig) -> Self {
        Self {
            key_prefix: cfg.key_prefix.clone(),
            default_ttl: cfg.default_ttl,
            expiry: cfg.expiry,
        }
    }
}

/// Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct SlotNotificationTracker {
    store: Arc<dyn TtlStore>,
    clock: Arc<dyn Clock>,
    opts: TrackerOptions,
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("slot_tracker_checks_total", "is_notified calls answered.");
        describe_counter!("slot_tracker_hits_total", "Checks that found the slot already notified.");
        describe_counter!("slot_tracker_marks_total", "Slots newly recorded as notified.");
        describe_counter!(
            "slot_tracker_backend_errors_total",
            "Store calls that failed with TrackerUnavailable."
        );
        describe_counter!("slot_tracker_swept_total", "Entries removed by sweep_expired.");
        describe_gauge!("slot_tracker_live_entries", "Live entries at the last count.");
    });
}

impl SlotNotificationTracker {
    /// Wire a tracker around an existing store.
    pub fn new(store: Arc<dyn TtlStore>, clock: Arc<dyn Clock>, opts: TrackerOptions) -> Self {
        ensure_metrics_described();
        Self { store, clock, opts }
    }

    /// Build the store named in `cfg` and verify it answers. Errors here are
    /// meant to stop the process; nothing is deferred to first use.
    pub async fn connect(cfg: &TrackerConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = connect_store(cfg, clock.clone()).await?;
        store.ping().await?;
        info!(prefix = %cfg.key_prefix, ttl_days = cfg.default_ttl.num_days(), "notification tracker ready");
        Ok(Self::new(store, clock, TrackerOptions::from(cfg)))
    }

    pub fn options(&self) -> &TrackerOptions {
        &self.opts
    }

    pub fn store(&self) -> &Arc<dyn TtlStore> {
        &self.store
    }

    /// Has this slot been announced and not yet expired?
    pub async fn is_notified(
        &self,
        resource_id: &str,
        slot_time: impl Into<DateTime<FixedOffset>>,
    ) -> Result<bool> {
        let key = SlotKey::new(resource_id, slot_time)?;
        self.is_key_notified(&key).await
    }

    pub async fn is_key_notified(&self, key: &SlotKey) -> Result<bool> {
        let encoded = key.encode(&self.opts.key_prefix);
        let seen = self.store.exists(&encoded).await.inspect_err(backend_error)?;
        counter!("slot_tracker_checks_total").increment(1);
        if seen {
            counter!("slot_tracker_hits_total").increment(1);
        }
        Ok(seen)
    }

    /// Record the slot as announced for `ttl`.
    ///
    /// Re-marking is harmless. Under [`ExpiryPolicy::Fixed`] the first write
    /// wins and keeps its expiry; under `Sliding` the TTL restarts.
    pub async fn mark_notified(
        &self,
        resource_id: &str,
        slot_time: impl Into<DateTime<FixedOffset>>,
        ttl: Duration,
    ) -> Result<()> {
        let key = SlotKey::new(resource_id, slot_time)?;
        self.mark_key_notified(&key, ttl).await
    }

    /// [`mark_notified`](Self::mark_notified) with the configured default TTL.
    pub async fn mark_notified_default(
        &self,
        resource_id: &str,
        slot_time: impl Into<DateTime<FixedOffset>>,
    ) -> Result<()> {
        self.mark_notified(resource_id, slot_time, self.opts.default_ttl).await
    }

    /// Fails with `InvalidTtl` when `ttl` could not be used by a mark made now.
    pub fn check_ttl(&self, ttl: Duration) -> Result<()> {
        expiry_from(self.clock.now(), ttl).map(|_| ())
    }

    pub async fn mark_key_notified(&self, key: &SlotKey, ttl: Duration) -> Result<()> {
        let now = self.clock.now();
        let entry = TrackedEntry {
            key: key.clone(),
            recorded_at: now,
            expires_at: expiry_from(now, ttl)?,
        };
        let value = serde_json::to_string(&entry)?;
        let mode = match self.opts.expiry {
            ExpiryPolicy::Fixed => WriteMode::IfAbsent,
            ExpiryPolicy::Sliding => WriteMode::Overwrite,
        };

        let encoded = key.encode(&self.opts.key_prefix);
        let written = self
            .store
            .set_with_expiry(&encoded, &value, ttl, mode)
            .await
            .inspect_err(backend_error)?;

        if written {
            counter!("slot_tracker_marks_total").increment(1);
            debug!(key = %encoded, ttl_secs = ttl.num_seconds(), "marked slot as notified");
        } else {
            debug!(key = %encoded, "slot already tracked; keeping original expiry");
        }
        Ok(())
    }

    /// Number of live entries under the prefix. Diagnostics only.
    pub async fn count_live_entries(&self) -> Result<usize> {
        let keys = self
            .store
            .scan_prefix(&self.opts.key_prefix)
            .await
            .inspect_err(backend_error)?;
        gauge!("slot_tracker_live_entries").set(keys.len() as f64);
        Ok(keys.len())
    }

    /// Up to `limit` live keys, sorted. Used to show example slots.
    pub async fn sample_keys(&self, limit: usize) -> Result<Vec<String>> {
        let mut keys = self
            .store
            .scan_prefix(&self.opts.key_prefix)
            .await
            .inspect_err(backend_error)?;
        keys.sort_unstable();
        keys.truncate(limit);
        Ok(keys)
    }

    /// Delete entries recorded more than `older_than` ago. A negative window,
    /// or one reaching before the first representable instant, is `InvalidTtl`.
    ///
    /// Store-side TTL is the real expiry path; this only reclaims memory
    /// sooner. Entries that cannot be decoded are skipped with a warning, and
    /// a key that vanishes mid-sweep is simply not counted.
    pub async fn sweep_expired(&self, older_than: Duration) -> Result<usize> {
        if older_than < Duration::zero() {
            return Err(TrackerError::InvalidTtl(older_than.num_seconds()));
        }
        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(older_than)
            .ok_or(TrackerError::InvalidTtl(older_than.num_seconds()))?;
        let keys = self
            .store
            .scan_prefix(&self.opts.key_prefix)
            .await
            .inspect_err(backend_error)?;

        let mut removed = 0usize;
        for key in keys {
            let Some(raw) = self.store.get(&key).await.inspect_err(backend_error)? else {
                continue;
            };
            let entry: TrackedEntry = match serde_json::from_str(&raw) {
                Ok(e) => e,
                Err(e) => {
                    warn!(%key, error = %e, "skipping undecodable tracker entry");
                    continue;
                }
            };
            if entry.recorded_at < cutoff && self.store.delete(&key).await.inspect_err(backend_error)? {
                removed += 1;
            }
        }

        if removed > 0 {
            counter!("slot_tracker_swept_total").increment(removed as u64);
            info!(removed, "manually swept old slot notifications");
        }
        Ok(removed)
    }

    /// Snapshot for the stats CLI and `/stats`.
    pub async fn stats(&self) -> Result<TrackerStats> {
        self.store.ping().await.inspect_err(backend_error)?;
        let total = self.count_live_entries().await?;
        let backend = self.store.info().await.inspect_err(backend_error)?;
        Ok(TrackerStats {
            total_notified_slots: total,
            backend_connected: true,
            backend,
            key_prefix: self.opts.key_prefix.clone(),
            default_ttl_secs: self.opts.default_ttl.num_seconds(),
            sampled_at: self.clock.now(),
        })
    }

    /// Backend liveness, for health probes.
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await.inspect_err(backend_error)
    }
}

fn expiry_from(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>> {
    if ttl <= Duration::zero() {
        return Err(TrackerError::InvalidTtl(ttl.num_seconds()));
    }
    now.checked_add_signed(ttl)
        .ok_or(TrackerError::InvalidTtl(ttl.num_seconds()))
}

fn backend_error(e: &TrackerError) {
    if e.is_unavailable() {
        counter!("slot_tracker_backend_errors_total").increment(1);
        warn!(error = %e, "tracker backend call failed");
    }
}
