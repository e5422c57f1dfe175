// src/models/hut.rs

//! Huts, their rooms, and the lookup table the orchestrator is given.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::CalendarSelectors;

/// How a hut's calendar is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Scrape the HTML booking calendar
    #[default]
    Scrape,
    /// Query a JSON availability endpoint month by month
    Api,
}

/// A bookable room type with its own calendar endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Room name (e.g., "Dormitory")
    pub name: String,

    /// Calendar endpoint URL
    #[serde(default)]
    pub url: String,
}

/// A mountain hut.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hut {
    /// Stable key used by subscriptions (e.g., "setokan")
    pub key: String,

    /// Display name; derived from the key when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Calendar source strategy
    #[serde(default)]
    pub source: SourceKind,

    /// Selector overrides for the scrape strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectors: Option<CalendarSelectors>,

    /// Rooms with their calendar endpoints
    #[serde(default)]
    pub rooms: Vec<Room>,
}

impl Hut {
    /// Display name, e.g. `osada_sanso` → `Osada Sanso`.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => title_case(&self.key),
        }
    }

    /// Selectors for the scrape strategy, falling back to defaults.
    pub fn selectors(&self) -> CalendarSelectors {
        self.selectors.clone().unwrap_or_default()
    }

    /// Rooms that have an endpoint configured.
    pub fn usable_rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.iter().filter(|r| !r.url.trim().is_empty())
    }

    /// Whether the hut has more than one room type.
    pub fn has_multiple_rooms(&self) -> bool {
        self.rooms.len() > 1
    }

    pub fn room(&self, name: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.name == name)
    }
}

fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Read-only lookup from hut key to hut.
#[derive(Debug, Clone, Default)]
pub struct HutTable {
    huts: BTreeMap<String, Hut>,
}

impl HutTable {
    /// Build a table, rejecting duplicate keys.
    pub fn new(huts: Vec<Hut>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for hut in huts {
            let key = hut.key.clone();
            if map.insert(key.clone(), hut).is_some() {
                return Err(AppError::config(format!("duplicate hut key '{key}'")));
            }
        }
        Ok(Self { huts: map })
    }

    pub fn get(&self, key: &str) -> Option<&Hut> {
        self.huts.get(key)
    }

    pub fn hut_count(&self) -> usize {
        self.huts.len()
    }

    pub fn room_count(&self) -> usize {
        self.huts.values().map(|h| h.rooms.len()).sum()
    }
}
