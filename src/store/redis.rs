// src/store/redis.rs
use std::future::Future;
use std::time::Duration as StdDuration;

use ::redis::aio::ConnectionManager;
use ::redis::{Client, InfoDict, RedisResult};
use async_trait::async_trait;
use chrono::Duration;

use super::{ttl_millis, TtlStore, WriteMode};
use crate::error::{Result, TrackerError};
use crate::stats::BackendInfo;

const SCAN_BATCH: usize = 500;

/// Redis-backed store. Expiry is native (`PX`), so nothing here ever sweeps.
///
/// `ConnectionManager` multiplexes one connection and reconnects on its own;
/// it is cloned per call.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    timeout: StdDuration,
}

impl RedisStore {
    /// Opens the connection and pings once. Any failure here is fatal to the caller.
    pub async fn connect(url: &str, timeout: StdDuration) -> Result<Self> {
        let client =
            Client::open(url).map_err(|e| TrackerError::Configuration(format!("invalid store url: {e}")))?;

        tracing::info!("connecting to redis store");
        let conn = tokio::time::timeout(timeout, client.get_connection_manager())
            .await
            .map_err(|_| TrackerError::unavailable("connect", format!("timed out after {timeout:?}")))?
            .map_err(|e| TrackerError::unavailable("connect", e))?;

        let store = Self { conn, timeout };
        store.ping().await?;
        tracing::info!("redis store reachable");
        Ok(store)
    }

    async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(TrackerError::unavailable(operation, e)),
            Err(_) => Err(TrackerError::unavailable(
                operation,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }
}

#[async_trait]
impl TtlStore for RedisStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let n: i64 = self
            .run("exists", async move { ::redis::cmd("EXISTS").arg(key).query_async(&mut conn).await })
            .await?;
        Ok(n > 0)
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration, mode: WriteMode) -> Result<bool> {
        let mut conn = self.conn.clone();
        let mut cmd = ::redis::cmd("SET");
        cmd.arg(key).arg(value).arg("PX").arg(ttl_millis(ttl));
        if mode == WriteMode::IfAbsent {
            cmd.arg("NX");
        }
        // "OK" when written, nil when NX found a live key.
        let reply: Option<String> = self
            .run("set", async move { cmd.query_async(&mut conn).await })
            .await?;
        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        self.run("get", async move { ::redis::cmd("GET").arg(key).query_async(&mut conn).await })
            .await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let n: i64 = self
            .run("delete", async move { ::redis::cmd("DEL").arg(key).query_async(&mut conn).await })
            .await?;
        Ok(n > 0)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let pattern = format!("{prefix}*");
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let mut conn = self.conn.clone();
            let pat = pattern.as_str();
            let (next, batch): (u64, Vec<String>) = self
                .run("scan", async move {
                    ::redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(pat)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(&mut conn)
                        .await
                })
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once across iterations.
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _pong: String = self
            .run("ping", async move { ::redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        Ok(())
    }

    async fn info(&self) -> Result<BackendInfo> {
        let mut conn = self.conn.clone();
        let info: InfoDict = self
            .run("info", async move { ::redis::cmd("INFO").query_async(&mut conn).await })
            .await?;
        Ok(BackendInfo {
            kind: "redis".to_string(),
            version: info.get("redis_version"),
            used_memory: info.get("used_memory_human"),
            connected_clients: info.get("connected_clients"),
        })
    }
}
