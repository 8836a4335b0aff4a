// src/error.rs
use thiserror::Error;

/// Everything the tracker can fail with.
///
/// None of these is ever folded into a "not notified" answer: a caller that
/// sees `Unavailable` decides itself whether to skip or retry the cycle.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Missing or invalid store endpoint / config value. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Backend unreachable, timed out or returned a transport error.
    #[error("tracker backend unavailable during {operation}: {reason}")]
    Unavailable {
        operation: &'static str,
        reason: String,
    },

    /// Caller passed a slot that cannot be encoded into a key.
    #[error("invalid slot: {0}")]
    Encoding(#[from] EncodingError),

    /// TTL or retention window that is not positive, or that reaches past
    /// the last representable instant.
    #[error("invalid ttl {0}s: must be positive and within the calendar range")]
    InvalidTtl(i64),

    /// A tracked entry could not be turned into its stored JSON form.
    #[error("cannot serialize tracked entry: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TrackerError {
    pub fn unavailable(operation: &'static str, reason: impl ToString) -> Self {
        Self::Unavailable {
            operation,
            reason: reason.to_string(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("resource id is empty")]
    EmptyResource,
    #[error("resource id {0:?} has leading or trailing whitespace")]
    UntrimmedResource(String),
    #[error("resource id {resource:?} contains forbidden character {ch:?}")]
    ForbiddenChar { resource: String, ch: char },
    #[error("cannot parse slot time {input:?}: {reason}")]
    UnparseableTime { input: String, reason: String },
    #[error("slot time {0} has sub-second precision")]
    SubsecondTime(String),
    #[error("slot time {0} is outside the encodable year range")]
    TimeOutOfRange(String),
    #[error("key {0:?} is not a v1 slot key")]
    MalformedKey(String),
}

pub type Result<T, E = TrackerError> = std::result::Result<T, E>;
