// src/models/mod.rs

//! Domain models for the watcher.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod hut;
mod notification;
mod observation;
mod selectors;
mod subscription;

// Re-export all public types
pub use config::{Config, CrawlerConfig, PathsConfig, SmtpConfig};
pub use hut::{Hut, HutTable, Room, SourceKind};
pub use notification::{BatchEntry, NotificationBatch, NotificationKey, NotificationRecord};
pub use observation::{Observation, SlotDetail, normalize};
pub use selectors::CalendarSelectors;
pub use subscription::{DateRange, Subscription};
