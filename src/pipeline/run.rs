// src/pipeline/run.rs

//! Watcher run orchestration.
//!
//! One run loads the subscriptions, fetches each referenced room once over
//! the union of the requested ranges, then walks the subscribers one at a
//! time: reconcile, notify, and only after a confirmed send, commit.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::error::{AppError, Result};
use crate::models::{
    BatchEntry, CrawlerConfig, DateRange, Hut, HutTable, NotificationBatch, Observation, Room,
    Subscription,
};
use crate::pipeline::reconcile::reconcile;
use crate::services::{CalendarSource, Notifier, SourceRegistry};
use crate::storage::{MarkOutcome, NotificationLedger, SubscriptionSource};
use crate::utils::log::{RunLog, summary};

/// Knobs for a single run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Send through the notifier but commit nothing to the ledger
    pub dry_run: bool,
    pub max_concurrent: usize,
    pub request_delay: Duration,
}

impl RunOptions {
    pub fn from_config(config: &CrawlerConfig, dry_run: bool) -> Self {
        Self {
            dry_run,
            max_concurrent: config.max_concurrent.max(1),
            request_delay: Duration::from_millis(config.request_delay_ms),
        }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default(), false)
    }
}

/// Counts collected over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub subscriptions: usize,
    pub skipped: usize,
    pub rooms_fetched: usize,
    pub room_failures: usize,
    pub batches_sent: usize,
    pub send_failures: usize,
    pub records_committed: usize,
}

impl RunReport {
    fn log_summary(&self, dry_run: bool, started: chrono::DateTime<Utc>) {
        let elapsed = Utc::now() - started;
        summary(
            if dry_run { "Watcher check" } else { "Watcher run" },
            &[
                ("Subscriptions", self.subscriptions.to_string()),
                ("Skipped", self.skipped.to_string()),
                ("Rooms fetched", self.rooms_fetched.to_string()),
                ("Room failures", self.room_failures.to_string()),
                ("Alerts sent", self.batches_sent.to_string()),
                ("Send failures", self.send_failures.to_string()),
                ("Records committed", self.records_committed.to_string()),
                ("Elapsed", format!("{}ms", elapsed.num_milliseconds())),
            ],
        );
    }
}

/// One room to read during the fetch stage.
struct FetchJob<'h> {
    hut: &'h Hut,
    room: &'h Room,
    range: DateRange,
    source: Arc<dyn CalendarSource>,
}

/// Subscriptions of one subscriber for one hut, notified together.
struct Recipient<'s> {
    email: &'s str,
    hut: &'s str,
    subscriptions: Vec<&'s Subscription>,
}

/// Drives watcher runs against injected collaborators.
pub struct Watcher<'a> {
    huts: &'a HutTable,
    sources: &'a SourceRegistry,
    ledger: &'a dyn NotificationLedger,
    notifier: &'a dyn Notifier,
    options: RunOptions,
}

impl<'a> Watcher<'a> {
    pub fn new(
        huts: &'a HutTable,
        sources: &'a SourceRegistry,
        ledger: &'a dyn NotificationLedger,
        notifier: &'a dyn Notifier,
        options: RunOptions,
    ) -> Self {
        Self {
            huts,
            sources,
            ledger,
            notifier,
            options,
        }
    }

    /// Execute one run.
    ///
    /// Only a subscription-store or ledger failure ends the run early with
    /// `Err`; everything else is logged and counted in the report.
    pub async fn run(&self, subscriptions: &dyn SubscriptionSource) -> Result<RunReport> {
        self.run_with_log(subscriptions, &RunLog::new()).await
    }

    async fn run_with_log(
        &self,
        subscriptions: &dyn SubscriptionSource,
        run_log: &RunLog,
    ) -> Result<RunReport> {
        let started = Utc::now();
        let mut report = RunReport::default();

        let subscriptions = subscriptions.load().await.inspect_err(|e| {
            log::error!("Cannot load subscriptions: {}", e.report());
        })?;
        report.subscriptions = subscriptions.len();
        log::info!("Loaded {} subscription(s)", subscriptions.len());

        let accepted = self.accept(&subscriptions, run_log, &mut report);
        let jobs = self.plan_fetches(&accepted, run_log);
        log::info!("Fetching {} room calendar(s)...", jobs.len());
        let observations = self.fetch_all(jobs, run_log, &mut report).await;

        let mut outcome = Ok(());
        for recipient in group_recipients(&accepted) {
            if let Err(e) = self
                .notify_recipient(&recipient, &observations, run_log, &mut report)
                .await
            {
                log::error!("Stopping run: {}", e.report());
                outcome = Err(e);
                break;
            }
        }

        report.log_summary(self.options.dry_run, started);
        run_log.flush_repeats();
        outcome.map(|()| report)
    }

    /// Drop subscriptions that cannot be served, with a warning each.
    fn accept<'s>(
        &self,
        subscriptions: &'s [Subscription],
        run_log: &RunLog,
        report: &mut RunReport,
    ) -> Vec<&'s Subscription> {
        let mut accepted = Vec::with_capacity(subscriptions.len());
        for sub in subscriptions {
            if sub.email.trim().is_empty() {
                run_log.warn(format!("Skipping subscription for '{}' with no email", sub.hut));
            } else if self.huts.get(&sub.hut).is_none() {
                run_log.warn(format!(
                    "Unknown hut '{}', skipping subscription for {}",
                    sub.hut, sub.email
                ));
            } else if sub.range().is_empty() {
                run_log.warn(format!(
                    "Empty range {} for {} at {}, skipping",
                    sub.range(),
                    sub.email,
                    sub.hut
                ));
            } else {
                accepted.push(sub);
                continue;
            }
            report.skipped += 1;
        }
        accepted
    }

    /// One job per usable room of each referenced hut, over the union of
    /// that hut's requested ranges.
    fn plan_fetches(&self, subscriptions: &[&Subscription], run_log: &RunLog) -> Vec<FetchJob<'a>> {
        let mut ranges: BTreeMap<&str, DateRange> = BTreeMap::new();
        for sub in subscriptions {
            let range = sub.range();
            ranges
                .entry(sub.hut.as_str())
                .and_modify(|r| *r = r.union(&range))
                .or_insert(range);
        }

        let mut jobs = Vec::new();
        for (key, range) in ranges {
            let Some(hut) = self.huts.get(key) else {
                continue;
            };
            let Some(source) = self.sources.source_for(hut) else {
                run_log.warn(format!("No calendar source registered for hut '{}'", key));
                continue;
            };
            for room in &hut.rooms {
                if room.url.trim().is_empty() {
                    run_log.warn(format!("{}/{}: no calendar url configured", key, room.name));
                }
            }
            jobs.extend(hut.usable_rooms().map(|room| FetchJob {
                hut,
                room,
                range,
                source: Arc::clone(&source),
            }));
        }
        jobs
    }

    /// Fetch every job with bounded concurrency. A failed room contributes
    /// no observations.
    async fn fetch_all(
        &self,
        jobs: Vec<FetchJob<'a>>,
        run_log: &RunLog,
        report: &mut RunReport,
    ) -> HashMap<String, Vec<Observation>> {
        let delay = self.options.request_delay;
        let mut by_hut: HashMap<String, Vec<Observation>> = HashMap::new();

        let mut fetches = stream::iter(jobs)
            .map(|job| async move {
                let result = job.source.fetch(job.hut, job.room, job.range, run_log).await;
                (job, result)
            })
            .buffer_unordered(self.options.max_concurrent.max(1));

        while let Some((job, result)) = fetches.next().await {
            match result {
                Ok(observations) => {
                    report.rooms_fetched += 1;
                    log::debug!(
                        "{}/{}: {} observation(s)",
                        job.hut.key,
                        job.room.name,
                        observations.len()
                    );
                    by_hut
                        .entry(job.hut.key.clone())
                        .or_default()
                        .extend(observations);
                }
                Err(e) => {
                    report.room_failures += 1;
                    run_log.warn(format!(
                        "{}/{}: no observations this run: {}",
                        job.hut.key, job.room.name, e
                    ));
                }
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        by_hut
    }

    /// Reconcile, send, and commit for one subscriber at one hut. Only
    /// ledger failures are returned.
    async fn notify_recipient(
        &self,
        recipient: &Recipient<'_>,
        observations: &HashMap<String, Vec<Observation>>,
        run_log: &RunLog,
        report: &mut RunReport,
    ) -> Result<()> {
        let Some(hut) = self.huts.get(recipient.hut) else {
            return Ok(());
        };
        let observed = observations
            .get(recipient.hut)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut entries: Vec<BatchEntry> = Vec::new();
        for sub in &recipient.subscriptions {
            entries.extend(reconcile(sub, observed, self.ledger).await?.entries);
        }
        let batch = NotificationBatch::from_entries(entries);

        if batch.is_empty() {
            log::info!(
                "No new availability for {} at {}",
                recipient.email,
                hut.display_name()
            );
            return Ok(());
        }

        if let Err(e) = self.notifier.send(recipient.email, hut, &batch).await {
            report.send_failures += 1;
            run_log.error(format!(
                "Failed to notify {} about {}: {}",
                recipient.email, hut.key, e
            ));
            return Ok(());
        }
        report.batches_sent += 1;

        if self.options.dry_run {
            return Ok(());
        }
        for date in batch.dates() {
            let outcome = self
                .ledger
                .mark_notified(recipient.email, &hut.key, date)
                .await
                .map_err(|e| {
                    AppError::store(format!(
                        "alert to {} for {} on {} was sent but not recorded: {}",
                        recipient.email, hut.key, date, e
                    ))
                })?;
            if outcome == MarkOutcome::Inserted {
                report.records_committed += 1;
            }
        }
        Ok(())
    }
}

/// Group subscriptions by (case-insensitive email, hut), keeping the order
/// in which each pair first appears.
fn group_recipients<'s>(subscriptions: &[&'s Subscription]) -> Vec<Recipient<'s>> {
    let mut index: HashMap<(String, &str), usize> = HashMap::new();
    let mut recipients: Vec<Recipient<'s>> = Vec::new();
    for &sub in subscriptions {
        let key = (sub.email.trim().to_lowercase(), sub.hut.as_str());
        match index.get(&key) {
            Some(&i) => recipients[i].subscriptions.push(sub),
            None => {
                index.insert(key, recipients.len());
                recipients.push(Recipient {
                    email: sub.email.trim(),
                    hut: &sub.hut,
                    subscriptions: vec![sub],
                });
            }
        }
    }
    recipients
}
