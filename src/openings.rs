// src/openings.rs
//! Glue between a polling worker and the tracker: take the slots a scrape
//! found, keep the ones nobody was told about yet, hand them to a notifier
//! grouped by resource and day, and record them once delivery succeeded.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::key::SlotKey;
use crate::tracker::SlotNotificationTracker;

/// A slot a scraper saw as bookable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub resource_id: String,
    pub slot_time: DateTime<FixedOffset>,
    /// Not part of the slot's identity.
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

impl AvailableSlot {
    pub fn new(resource_id: impl Into<String>, slot_time: DateTime<FixedOffset>) -> Self {
        Self {
            resource_id: resource_id.into(),
            slot_time,
            duration_minutes: None,
        }
    }
}

/// New openings for one resource on one local calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct OpeningBatch {
    pub resource_id: String,
    pub date: NaiveDate,
    pub slots: Vec<AvailableSlot>,
}

impl OpeningBatch {
    /// e.g. `bethpage_black on Sunday, 01 June 2025: 5:00pm, 5:10pm`
    pub fn message(&self) -> String {
        let times: Vec<String> = self
            .slots
            .iter()
            .map(|s| {
                let t = s.slot_time.format("%-I:%M%P").to_string();
                match s.duration_minutes {
                    Some(d) => format!("{t} ({d} min)"),
                    None => t,
                }
            })
            .collect();
        format!(
            "{} on {}: {}",
            self.resource_id,
            self.date.format("%A, %d %B %Y"),
            times.join(", ")
        )
    }
}

/// Delivery side of the polling layer (push service, chat webhook, ...).
#[async_trait]
pub trait OpeningsNotifier: Send + Sync {
    async fn deliver(&self, batch: &OpeningBatch) -> anyhow::Result<()>;
}

/// Notifier that only writes to the log. Useful for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl OpeningsNotifier for LogNotifier {
    async fn deliver(&self, batch: &OpeningBatch) -> anyhow::Result<()> {
        tracing::info!(
            target: "openings",
            resource = %batch.resource_id,
            date = %batch.date,
            slots = batch.slots.len(),
            "{}",
            batch.message()
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OpeningsReport {
    pub candidates: usize,
    pub already_notified: usize,
    pub notified: usize,
    pub failed_batches: usize,
}

/// Groups by `(resource, date in the slot's own offset)`, each batch sorted by time.
pub fn group_by_resource_and_date(slots: Vec<AvailableSlot>) -> Vec<OpeningBatch> {
    let mut groups: BTreeMap<(String, NaiveDate), Vec<AvailableSlot>> = BTreeMap::new();
    for s in slots {
        let date = s.slot_time.date_naive();
        groups.entry((s.resource_id.clone(), date)).or_default().push(s);
    }
    groups
        .into_iter()
        .map(|((resource_id, date), mut slots)| {
            slots.sort_by_key(|s| s.slot_time);
            OpeningBatch {
                resource_id,
                date,
                slots,
            }
        })
        .collect()
}

/// One polling cycle's worth of notification work.
///
/// If the tracker cannot be asked, the whole cycle is abandoned with
/// `Unavailable` before anything is sent; the next cycle retries. A batch
/// whose delivery fails is left unmarked so it is offered again next cycle.
/// A `ttl` the tracker would refuse fails the cycle before any lookup or send.
pub async fn notify_new_openings(
    tracker: &SlotNotificationTracker,
    notifier: &dyn OpeningsNotifier,
    slots: Vec<AvailableSlot>,
    ttl: Duration,
) -> Result<OpeningsReport> {
    tracker.check_ttl(ttl)?;

    let mut report = OpeningsReport {
        candidates: slots.len(),
        ..Default::default()
    };

    let mut seen_in_batch = HashSet::new();
    let mut fresh = Vec::new();
    for s in slots {
        let key = SlotKey::new(s.resource_id.as_str(), s.slot_time)?;
        if !seen_in_batch.insert(key.clone()) {
            continue;
        }
        if tracker.is_key_notified(&key).await? {
            report.already_notified += 1;
        } else {
            fresh.push(s);
        }
    }

    for batch in group_by_resource_and_date(fresh) {
        if let Err(e) = notifier.deliver(&batch).await {
            tracing::warn!(resource = %batch.resource_id, date = %batch.date, error = ?e, "opening delivery failed");
            report.failed_batches += 1;
            continue;
        }
        for s in &batch.slots {
            let key = SlotKey::new(s.resource_id.as_str(), s.slot_time)?;
            tracker.mark_key_notified(&key, ttl).await?;
            report.notified += 1;
        }
    }

    Ok(report)
}
