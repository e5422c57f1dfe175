// src/models/observation.rs

//! Availability facts read from a calendar source.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Time-slot detail attached to an observation, when the source exposes it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotDetail {
    /// Slot start time as shown by the source (e.g. "06:00")
    pub time: String,

    /// Remaining capacity, if the source reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
}

impl SlotDetail {
    /// Human-readable rendering, e.g. `06:00 (3 left)`.
    pub fn describe(&self) -> String {
        match self.remaining {
            Some(n) => format!("{} ({} left)", self.time, n),
            None => self.time.clone(),
        }
    }
}

/// One (date, availability) fact for one room, read during a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,

    /// Room name as configured for the hut
    pub room: String,

    pub available: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<SlotDetail>,
}

impl Observation {
    pub fn new(date: NaiveDate, room: impl Into<String>, available: bool) -> Self {
        Self {
            date,
            room: room.into(),
            available,
            slot: None,
        }
    }

    pub fn with_slot(mut self, slot: SlotDetail) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Sort key: date, then room, then slot time.
    pub fn sort_key(&self) -> (NaiveDate, &str, Option<&str>) {
        (
            self.date,
            self.room.as_str(),
            self.slot.as_ref().map(|s| s.time.as_str()),
        )
    }
}

/// Order observations by date, room, and slot, dropping repeats.
///
/// When the same day was read twice with different flags, the available
/// reading wins.
pub fn normalize(mut observations: Vec<Observation>) -> Vec<Observation> {
    observations.sort_by(|a, b| {
        a.sort_key()
            .cmp(&b.sort_key())
            .then_with(|| b.available.cmp(&a.available))
    });
    observations.dedup_by(|a, b| a.sort_key() == b.sort_key());
    observations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_orders_and_dedups() {
        let d1: NaiveDate = "2025-07-14".parse().unwrap();
        let d2: NaiveDate = "2025-07-15".parse().unwrap();
        let obs = vec![
            Observation::new(d2, "Dorm", true),
            Observation::new(d1, "Private", true),
            Observation::new(d1, "Dorm", true),
            Observation::new(d1, "Dorm", true),
        ];

        let normalized = normalize(obs);
        let keys: Vec<_> = normalized.iter().map(|o| (o.date, o.room.as_str())).collect();
        assert_eq!(keys, vec![(d1, "Dorm"), (d1, "Private"), (d2, "Dorm")]);
    }

    #[test]
    fn test_slot_describe() {
        let slot = SlotDetail {
            time: "06:00".into(),
            remaining: Some(3),
        };
        assert_eq!(slot.describe(), "06:00 (3 left)");
    }
}
