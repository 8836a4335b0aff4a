// src/config.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::Deserialize;

use crate::error::{Result, TrackerError};
use crate::key::DEFAULT_KEY_PREFIX;

pub const ENV_STORE_URL: &str = "SLOT_TRACKER_URL";
/// Legacy name still honoured; hosted Redis add-ons export it.
pub const ENV_REDIS_URL: &str = "REDIS_URL";
pub const ENV_CONFIG_PATH: &str = "SLOT_TRACKER_CONFIG";
pub const ENV_TTL_DAYS: &str = "SLOT_TRACKER_TTL_DAYS";
pub const ENV_PREFIX: &str = "SLOT_TRACKER_PREFIX";
pub const ENV_OP_TIMEOUT_MS: &str = "SLOT_TRACKER_OP_TIMEOUT_MS";
pub const ENV_EXPIRY: &str = "SLOT_TRACKER_EXPIRY";

pub const DEFAULT_CONFIG_PATH: &str = "config/tracker.toml";
pub const DEFAULT_TTL_DAYS: i64 = 7;
pub const DEFAULT_OP_TIMEOUT_MS: u64 = 2_000;

/// What re-marking a live slot does to its expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryPolicy {
    /// First write wins; the original expiry stands.
    #[default]
    Fixed,
    /// Every mark restarts the TTL.
    Sliding,
}

impl ExpiryPolicy {
    fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "sliding" => Ok(Self::Sliding),
            other => Err(TrackerError::Configuration(format!(
                "{ENV_EXPIRY} must be 'fixed' or 'sliding', got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub store_url: String,
    pub default_ttl: Duration,
    pub key_prefix: String,
    pub op_timeout: StdDuration,
    pub expiry: ExpiryPolicy,
}

impl TrackerConfig {
    /// Config with defaults for everything but the endpoint.
    pub fn with_url(store_url: impl Into<String>) -> Self {
        Self {
            store_url: store_url.into(),
            default_ttl: Duration::days(DEFAULT_TTL_DAYS),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            op_timeout: StdDuration::from_millis(DEFAULT_OP_TIMEOUT_MS),
            expiry: ExpiryPolicy::Fixed,
        }
    }

    /// Load using env var + fallbacks:
    /// 1) file at $SLOT_TRACKER_CONFIG (must exist if set)
    /// 2) config/tracker.toml if present
    /// 3) environment overrides on top ($SLOT_TRACKER_URL, then $REDIS_URL, ...)
    ///
    /// A missing store URL is a configuration error; the tracker cannot run without one.
    pub fn from_env() -> Result<Self> {
        let file = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(TrackerError::Configuration(format!(
                        "{ENV_CONFIG_PATH} points to non-existent path {}",
                        pb.display()
                    )));
                }
                Some(FileConfig::load(&pb)?)
            }
            Err(_) => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Some(FileConfig::load(default)?)
                } else {
                    None
                }
            }
        };
        Self::resolve(file.unwrap_or_default(), |k| std::env::var(k).ok())
    }

    /// Load from an explicit TOML file, still applying environment overrides.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = FileConfig::load(path)?;
        Self::resolve(file, |k| std::env::var(k).ok())
    }

    fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = |k: &str| env(k).filter(|v| !v.trim().is_empty());
        let t = file.tracker;

        let store_url = env(ENV_STORE_URL)
            .or_else(|| env(ENV_REDIS_URL))
            .or(t.store_url)
            .ok_or_else(|| {
                TrackerError::Configuration(format!(
                    "no store url: set {ENV_STORE_URL} (or {ENV_REDIS_URL}) or tracker.store_url"
                ))
            })?;

        let ttl_days = match env(ENV_TTL_DAYS) {
            Some(v) => parse_number::<i64>(ENV_TTL_DAYS, &v)?,
            None => t.ttl_days.unwrap_or(DEFAULT_TTL_DAYS),
        };
        let default_ttl = Duration::try_days(ttl_days)
            .filter(|d| *d > Duration::zero())
            .ok_or_else(|| {
                TrackerError::Configuration(format!(
                    "ttl_days must be positive and within range, got {ttl_days}"
                ))
            })?;

        let op_timeout_ms = match env(ENV_OP_TIMEOUT_MS) {
            Some(v) => parse_number::<u64>(ENV_OP_TIMEOUT_MS, &v)?,
            None => t.op_timeout_ms.unwrap_or(DEFAULT_OP_TIMEOUT_MS),
        };
        if op_timeout_ms == 0 {
            return Err(TrackerError::Configuration("op_timeout_ms must be positive".into()));
        }

        let expiry = match env(ENV_EXPIRY) {
            Some(v) => ExpiryPolicy::parse(&v)?,
            None => t.expiry.unwrap_or_default(),
        };

        let key_prefix = env(ENV_PREFIX)
            .or(t.key_prefix)
            .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string());
        validate_prefix(&key_prefix)?;

        Ok(Self {
            store_url: store_url.trim().to_string(),
            default_ttl,
            key_prefix,
            op_timeout: StdDuration::from_millis(op_timeout_ms),
            expiry,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    tracker: FileTracker,
}

#[derive(Debug, Default, Deserialize)]
struct FileTracker {
    store_url: Option<String>,
    ttl_days: Option<i64>,
    key_prefix: Option<String>,
    op_timeout_ms: Option<u64>,
    expiry: Option<ExpiryPolicy>,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            TrackerError::Configuration(format!("reading {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| TrackerError::Configuration(format!("parsing {}: {e}", path.display())))
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, v: &str) -> Result<T> {
    v.trim()
        .parse()
        .map_err(|_| TrackerError::Configuration(format!("{name} is not a valid number: {v:?}")))
}

fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(TrackerError::Configuration("key prefix must not be empty".into()));
    }
    if prefix.contains(['*', '?', '[', ']', '\\']) || prefix.chars().any(char::is_whitespace) {
        return Err(TrackerError::Configuration(format!(
            "key prefix {prefix:?} contains glob or whitespace characters"
        )));
    }
    Ok(())
}
