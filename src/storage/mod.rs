//! Storage abstractions for the watcher's durable inputs and outputs.
//!
//! - Subscriptions: read-only input, one entry per (email, hut, range)
//! - Ledger: append-only record of notifications already sent
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml           # Crawler settings and hut table
//! ├── subscriptions.toml    # Subscriber requests
//! └── ledger.db             # Notifications already sent (SQLite)
//! ```

pub mod ledger;
pub mod subscriptions;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{NotificationRecord, Subscription};

// Re-export for convenience
pub use ledger::{MemoryLedger, SqliteLedger};
pub use subscriptions::{FileSubscriptions, StaticSubscriptions};

/// Outcome of an insert-if-absent ledger write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// A new record was written
    Inserted,
    /// The triple was already recorded; nothing changed
    AlreadyPresent,
}

/// Durable record of which (email, hut, date) triples were notified.
#[async_trait]
pub trait NotificationLedger: Send + Sync {
    /// Whether a notification for the triple was already sent.
    async fn has_been_notified(&self, email: &str, hut: &str, date: NaiveDate) -> Result<bool>;

    /// Record a sent notification. Idempotent: a repeated call for the same
    /// triple succeeds with `MarkOutcome::AlreadyPresent`.
    async fn mark_notified(&self, email: &str, hut: &str, date: NaiveDate) -> Result<MarkOutcome>;

    /// All records, ordered by key.
    async fn records(&self) -> Result<Vec<NotificationRecord>>;
}

/// Source of subscriber requests.
#[async_trait]
pub trait SubscriptionSource: Send + Sync {
    async fn load(&self) -> Result<Vec<Subscription>>;
}
