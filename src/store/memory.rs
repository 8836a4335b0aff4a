// src/store/memory.rs
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::{TtlStore, WriteMode};
use crate::clock::Clock;
use crate::error::{Result, TrackerError};
use crate::stats::BackendInfo;

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Process-local TTL map. Expiry is lazy: a dead entry is ignored on read
/// and dropped on the next write or scan that touches it.
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, StoredValue>>,
    clock: Arc<dyn Clock>,
    offline: AtomicBool,
}

impl InMemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            offline: AtomicBool::new(false),
        }
    }

    /// Simulate an outage: every call fails with `Unavailable` until reset.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Raw entry count, dead entries included.
    pub fn stored_len(&self) -> usize {
        self.entries.read().expect("memory store lock poisoned").len()
    }

    fn check_online(&self, operation: &'static str) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TrackerError::unavailable(operation, "in-memory store is offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl TtlStore for InMemoryStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        self.check_online("exists")?;
        let now = self.clock.now();
        let map = self.entries.read().expect("memory store lock poisoned");
        Ok(map.get(key).is_some_and(|s| s.expires_at > now))
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration, mode: WriteMode) -> Result<bool> {
        self.check_online("set")?;
        let now = self.clock.now();
        let mut map = self.entries.write().expect("memory store lock poisoned");

        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or(TrackerError::InvalidTtl(ttl.num_seconds()))?;
        let live = map.get(key).is_some_and(|s| s.expires_at > now);
        if live && mode == WriteMode::IfAbsent {
            return Ok(false);
        }
        map.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_online("get")?;
        let now = self.clock.now();
        let map = self.entries.read().expect("memory store lock poisoned");
        Ok(map
            .get(key)
            .filter(|s| s.expires_at > now)
            .map(|s| s.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check_online("delete")?;
        let now = self.clock.now();
        let mut map = self.entries.write().expect("memory store lock poisoned");
        Ok(map.remove(key).is_some_and(|s| s.expires_at > now))
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        self.check_online("scan")?;
        let now = self.clock.now();
        let mut map = self.entries.write().expect("memory store lock poisoned");
        map.retain(|_, s| s.expires_at > now);
        Ok(map.keys().filter(|k| k.starts_with(prefix)).cloned().collect())
    }

    async fn ping(&self) -> Result<()> {
        self.check_online("ping")
    }

    async fn info(&self) -> Result<BackendInfo> {
        self.check_online("info")?;
        Ok(BackendInfo {
            kind: "memory".to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            used_memory: None,
            connected_clients: None,
        })
    }
}
