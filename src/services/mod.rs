//! Service layer for the watcher.
//!
//! This module contains the business logic for:
//! - Reading booking calendars (`CalendarSource`, `ScrapeSource`, `ApiSource`)
//! - Choosing a calendar strategy per hut (`SourceRegistry`)
//! - Delivering alerts (`Notifier`, `SmtpNotifier`, `LogNotifier`)

pub mod api;
pub mod calendar;
pub mod notifier;
pub mod scrape;

pub use api::ApiSource;
pub use calendar::{CalendarPage, CalendarSource, SourceRegistry, Walk, WalkEnd, walk_pages};
pub use notifier::{Composed, LogNotifier, Notifier, SmtpNotifier, compose};
pub use scrape::ScrapeSource;
