//! # Slot keys
//! Identity of a notifiable event and its storage key.
//!
//! Version 1 layout:
//!
//! ```text
//! <prefix>v1:<resource_id>:<slot time, UTC, RFC 3339, seconds, 'Z'>
//! notified_slot:v1:bethpage_black:2025-06-01T21:00:00Z
//! ```
//!
//! The timestamp is normalised to UTC so the same instant written with two
//! different offsets lands on one key. It is always 20 bytes wide, which
//! keeps keys sortable and lets [`SlotKey::decode`] split on position
//! instead of searching for a separator that also occurs inside the time.

use chrono::{DateTime, FixedOffset, SecondsFormat, Timelike, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::EncodingError;

/// Namespace shared by every tracked entry.
pub const DEFAULT_KEY_PREFIX: &str = "notified_slot:";

/// Encoding version tag, bumped whenever the layout changes.
pub const KEY_VERSION: &str = "v1";

const ENCODED_TIME_LEN: usize = "2025-06-01T21:00:00Z".len();

/// `(resource, instant)` identity of a slot. Duration, price and any other
/// attribute scraped later are deliberately not part of it.
///
/// Equality and hashing follow `DateTime`, i.e. they compare instants, so
/// `17:00-04:00` and `21:00Z` are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    resource_id: String,
    slot_time: DateTime<FixedOffset>,
}

impl SlotKey {
    /// Validates both parts; rejects anything [`encode`](Self::encode) could not
    /// round-trip.
    pub fn new(
        resource_id: impl Into<String>,
        slot_time: impl Into<DateTime<FixedOffset>>,
    ) -> Result<Self, EncodingError> {
        let resource_id = resource_id.into();
        let slot_time = slot_time.into();
        validate_resource(&resource_id)?;
        encode_time(&slot_time)?;
        Ok(Self {
            resource_id,
            slot_time,
        })
    }

    /// Same as [`new`](Self::new) but takes the time as an RFC 3339 string.
    pub fn parse(resource_id: impl Into<String>, slot_time: &str) -> Result<Self, EncodingError> {
        Self::new(resource_id, parse_slot_time(slot_time)?)
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn slot_time(&self) -> DateTime<FixedOffset> {
        self.slot_time
    }

    /// Storage key under `prefix`.
    pub fn encode(&self, prefix: &str) -> String {
        // Validated in `new`, so the time always fits the fixed-width form.
        let time = self.slot_time.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, true);
        format!("{prefix}{KEY_VERSION}:{}:{time}", self.resource_id)
    }

    /// Inverse of [`encode`](Self::encode). The decoded time carries a UTC offset.
    pub fn decode(prefix: &str, key: &str) -> Result<Self, EncodingError> {
        let malformed = || EncodingError::MalformedKey(key.to_string());

        let body = key
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix(KEY_VERSION))
            .and_then(|rest| rest.strip_prefix(':'))
            .ok_or_else(malformed)?;

        // "<resource>:<20-byte time>"
        if body.len() < ENCODED_TIME_LEN + 2 || !body.is_char_boundary(body.len() - ENCODED_TIME_LEN) {
            return Err(malformed());
        }
        let (head, time) = body.split_at(body.len() - ENCODED_TIME_LEN);
        let resource = head.strip_suffix(':').ok_or_else(malformed)?;

        let slot_time = DateTime::parse_from_rfc3339(time).map_err(|_| malformed())?;
        Self::new(resource, slot_time)
    }
}

/// Parses an RFC 3339 timestamp. An explicit offset is mandatory: a naive
/// local time cannot be compared safely with what another worker stored.
pub fn parse_slot_time(input: &str) -> Result<DateTime<FixedOffset>, EncodingError> {
    DateTime::parse_from_rfc3339(input.trim()).map_err(|e| EncodingError::UnparseableTime {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

fn forbidden_chars() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    // ':' separates key parts; the rest are glob metacharacters for prefix scans.
    RE.get_or_init(|| Regex::new(r"[:*?\[\]\\\x00-\x1f\x7f]").expect("static regex"))
}

fn validate_resource(resource: &str) -> Result<(), EncodingError> {
    if resource.trim().is_empty() {
        return Err(EncodingError::EmptyResource);
    }
    if resource.trim() != resource {
        return Err(EncodingError::UntrimmedResource(resource.to_string()));
    }
    if let Some(m) = forbidden_chars().find(resource) {
        let ch = m.as_str().chars().next().unwrap_or_default();
        return Err(EncodingError::ForbiddenChar {
            resource: resource.to_string(),
            ch,
        });
    }
    Ok(())
}

fn encode_time(t: &DateTime<FixedOffset>) -> Result<String, EncodingError> {
    if t.nanosecond() != 0 {
        return Err(EncodingError::SubsecondTime(t.to_rfc3339()));
    }
    let s = t.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, true);
    if s.len() != ENCODED_TIME_LEN {
        return Err(EncodingError::TimeOutOfRange(t.to_rfc3339()));
    }
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bethpage() -> SlotKey {
        SlotKey::parse("bethpage_black", "2025-06-01T17:00:00-04:00").unwrap()
    }

    #[test]
    fn v1_layout_is_pinned() {
        assert_eq!(
            bethpage().encode(DEFAULT_KEY_PREFIX),
            "notified_slot:v1:bethpage_black:2025-06-01T21:00:00Z"
        );
        let k = SlotKey::parse("Court 3", "2024-12-31T23:59:59Z").unwrap();
        assert_eq!(k.encode("p:"), "p:v1:Court 3:2024-12-31T23:59:59Z");
    }

    #[test]
    fn same_instant_different_offset_is_same_key() {
        let a = bethpage();
        let b = SlotKey::new(
            "bethpage_black",
            Utc.with_ymd_and_hms(2025, 6, 1, 21, 0, 0).unwrap(),
        )
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.encode(DEFAULT_KEY_PREFIX), b.encode(DEFAULT_KEY_PREFIX));
    }

    #[test]
    fn one_second_apart_differs() {
        let a = bethpage();
        let b = SlotKey::new("bethpage_black", a.slot_time() + chrono::Duration::seconds(1)).unwrap();
        assert_ne!(a.encode(DEFAULT_KEY_PREFIX), b.encode(DEFAULT_KEY_PREFIX));
    }

    #[test]
    fn no_trailing_marker() {
        assert!(bethpage().encode(DEFAULT_KEY_PREFIX).ends_with(":00Z"));
    }

    #[test]
    fn decode_inverts_encode() {
        let k = bethpage();
        let back = SlotKey::decode(DEFAULT_KEY_PREFIX, &k.encode(DEFAULT_KEY_PREFIX)).unwrap();
        assert_eq!(back, k);
        assert_eq!(back.resource_id(), "bethpage_black");
    }

    #[test]
    fn decode_rejects_foreign_keys() {
        for key in [
            "other:v1:x:2025-06-01T21:00:00Z",
            "notified_slot:v2:x:2025-06-01T21:00:00Z",
            "notified_slot:v1:2025-06-01T21:00:00Z",
            "notified_slot:bethpage_black:2025-06-01T21:00:00+00:002",
        ] {
            assert!(
                matches!(SlotKey::decode(DEFAULT_KEY_PREFIX, key), Err(EncodingError::MalformedKey(_))),
                "{key} should not decode"
            );
        }
    }

    #[test]
    fn bad_resources_rejected() {
        let t = "2025-06-01T17:00:00-04:00";
        assert_eq!(SlotKey::parse("", t), Err(EncodingError::EmptyResource));
        assert_eq!(SlotKey::parse("   ", t), Err(EncodingError::EmptyResource));
        assert!(matches!(SlotKey::parse(" a", t), Err(EncodingError::UntrimmedResource(_))));
        assert!(matches!(
            SlotKey::parse("a:b", t),
            Err(EncodingError::ForbiddenChar { ch: ':', .. })
        ));
        assert!(matches!(
            SlotKey::parse("court*", t),
            Err(EncodingError::ForbiddenChar { ch: '*', .. })
        ));
    }

    #[test]
    fn bad_times_rejected() {
        assert!(matches!(
            SlotKey::parse("a", "2025-06-01 17:00"),
            Err(EncodingError::UnparseableTime { .. })
        ));
        // naive, no offset
        assert!(matches!(
            SlotKey::parse("a", "2025-06-01T17:00:00"),
            Err(EncodingError::UnparseableTime { .. })
        ));
        assert!(matches!(
            SlotKey::parse("a", "2025-06-01T17:00:00.250Z"),
            Err(EncodingError::SubsecondTime(_))
        ));
    }
}
