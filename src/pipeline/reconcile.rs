//! Availability reconciliation.
//!
//! Intersects a run's observations with a subscription's requested nights
//! and drops nights the subscriber has already been told about.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{BatchEntry, DateRange, NotificationBatch, Observation, Subscription};
use crate::storage::NotificationLedger;

/// Available observations inside `range`, as batch entries.
pub fn candidates(range: DateRange, observations: &[Observation]) -> Vec<BatchEntry> {
    observations
        .iter()
        .filter(|o| o.available && range.contains(o.date))
        .map(BatchEntry::from)
        .collect()
}

/// Build the batch of not-yet-notified nights for one subscription.
///
/// The ledger is only read here; each distinct night is looked up once.
/// Entries are ordered by date, then room, then slot.
pub async fn reconcile(
    subscription: &Subscription,
    observations: &[Observation],
    ledger: &dyn NotificationLedger,
) -> Result<NotificationBatch> {
    let entries = candidates(subscription.range(), observations);

    let mut already: BTreeMap<NaiveDate, bool> = BTreeMap::new();
    let mut fresh = Vec::with_capacity(entries.len());
    for entry in entries {
        let notified = match already.get(&entry.date) {
            Some(notified) => *notified,
            None => {
                let notified = ledger
                    .has_been_notified(&subscription.email, &subscription.hut, entry.date)
                    .await?;
                already.insert(entry.date, notified);
                notified
            }
        };
        if !notified {
            fresh.push(entry);
        }
    }

    Ok(NotificationBatch::from_entries(fresh))
}
