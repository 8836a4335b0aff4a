// src/stats.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata a backend reports about itself. Fields the backend does not
/// expose stay `None`.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct BackendInfo {
    /// "redis" | "memory"
    pub kind: String,
    pub version: Option<String>,
    pub used_memory: Option<String>,
    pub connected_clients: Option<u64>,
}

/// Read-only snapshot, computed on demand.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerStats {
    pub total_notified_slots: usize,
    pub backend_connected: bool,
    pub backend: BackendInfo,
    pub key_prefix: String,
    pub default_ttl_secs: i64,
    pub sampled_at: DateTime<Utc>,
}

impl fmt::Display for TrackerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unknown = || "Unknown".to_string();
        writeln!(f, "=== Notification Tracker Statistics ===")?;
        writeln!(f, "Total notified slots: {}", self.total_notified_slots)?;
        writeln!(f, "Backend ({}) connected: {}", self.backend.kind, self.backend_connected)?;
        writeln!(
            f,
            "Backend version: {}",
            self.backend.version.clone().unwrap_or_else(unknown)
        )?;
        writeln!(
            f,
            "Used memory: {}",
            self.backend.used_memory.clone().unwrap_or_else(unknown)
        )?;
        write!(
            f,
            "Connected clients: {}",
            self.backend
                .connected_clients
                .map(|n| n.to_string())
                .unwrap_or_else(unknown)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_fills_unknowns() {
        let s = TrackerStats {
            total_notified_slots: 3,
            backend_connected: true,
            backend: BackendInfo {
                kind: "memory".into(),
                ..Default::default()
            },
            key_prefix: "notified_slot:".into(),
            default_ttl_secs: 604_800,
            sampled_at: Utc::now(),
        };
        let out = s.to_string();
        assert!(out.contains("Total notified slots: 3"));
        assert!(out.contains("Backend (memory) connected: true"));
        assert!(out.contains("Backend version: Unknown"));
        assert!(out.contains("Connected clients: Unknown"));
    }
}
