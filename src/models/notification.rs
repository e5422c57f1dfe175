// src/models/notification.rs

//! Ledger records and per-message batches.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Observation, SlotDetail};

/// Key identifying one notification: (subscriber, hut, night).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NotificationKey {
    pub email: String,
    pub hut: String,
    pub date: NaiveDate,
}

impl NotificationKey {
    /// Build a key; the email is compared case-insensitively.
    pub fn new(email: &str, hut: &str, date: NaiveDate) -> Self {
        Self {
            email: email.trim().to_lowercase(),
            hut: hut.to_string(),
            date,
        }
    }
}

/// A notification that was successfully sent. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    #[serde(flatten)]
    pub key: NotificationKey,

    /// When the record was committed
    pub notified_at: DateTime<Utc>,
}

/// One newly-available night (optionally a specific room slot) in a batch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchEntry {
    pub date: NaiveDate,
    pub room: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<SlotDetail>,
}

impl From<&Observation> for BatchEntry {
    fn from(obs: &Observation) -> Self {
        Self {
            date: obs.date,
            room: obs.room.clone(),
            slot: obs.slot.clone(),
        }
    }
}

/// Everything one subscriber should hear about one hut in one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationBatch {
    pub entries: Vec<BatchEntry>,
}

impl NotificationBatch {
    /// Build a batch, ordering entries by date, room, then slot.
    pub fn from_entries(mut entries: Vec<BatchEntry>) -> Self {
        entries.sort();
        entries.dedup();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Distinct nights in ascending order; one ledger record each.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.entries.iter().map(|e| e.date).collect();
        dates.dedup();
        dates
    }

    /// Distinct room names in the batch.
    pub fn rooms(&self) -> Vec<&str> {
        let mut rooms: Vec<&str> = self.entries.iter().map(|e| e.room.as_str()).collect();
        rooms.sort_unstable();
        rooms.dedup();
        rooms
    }

    /// Entries grouped by room, each group in date order.
    pub fn by_room(&self) -> BTreeMap<&str, Vec<&BatchEntry>> {
        let mut groups: BTreeMap<&str, Vec<&BatchEntry>> = BTreeMap::new();
        for entry in &self.entries {
            groups.entry(entry.room.as_str()).or_default().push(entry);
        }
        groups
    }
}
