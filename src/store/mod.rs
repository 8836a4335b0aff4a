// src/store/mod.rs
//! Minimal interface any TTL-capable key-value store must offer.
//!
//! Expiry belongs to the store: the tracker never runs a timer of its own.

pub mod memory;
pub mod redis;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::stats::BackendInfo;

pub use self::memory::InMemoryStore;
pub use self::redis::RedisStore;

/// How `set_with_expiry` treats a key that is already live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Keep the existing value and expiry (SET NX).
    IfAbsent,
    /// Replace value and restart the TTL.
    Overwrite,
}

#[async_trait]
pub trait TtlStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Returns whether the value was written.
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration, mode: WriteMode) -> Result<bool>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Returns whether a live key was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// All live keys starting with `prefix`, in no particular order.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    async fn ping(&self) -> Result<()>;

    async fn info(&self) -> Result<BackendInfo>;
}

/// Builds the store named by `cfg.store_url`.
///
/// - `redis://` / `rediss://` / `redis+unix://` → [`RedisStore`]
/// - `memory://` → [`InMemoryStore`] (single process only)
pub async fn connect_store(cfg: &TrackerConfig, clock: Arc<dyn Clock>) -> Result<Arc<dyn TtlStore>> {
    let url = cfg.store_url.trim();
    let scheme = url
        .split_once("://")
        .map(|(s, _)| s.to_ascii_lowercase())
        .ok_or_else(|| TrackerError::Configuration(format!("store url {url:?} has no scheme")))?;

    match scheme.as_str() {
        "redis" | "rediss" | "redis+unix" | "unix" => {
            let store = RedisStore::connect(url, cfg.op_timeout).await?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(InMemoryStore::new(clock))),
        other => Err(TrackerError::Configuration(format!(
            "unsupported store scheme {other:?} (expected redis, rediss or memory)"
        ))),
    }
}

/// TTL in whole milliseconds; callers have already rejected non-positive values.
pub(crate) fn ttl_millis(ttl: Duration) -> u64 {
    ttl.num_milliseconds().max(1) as u64
}
