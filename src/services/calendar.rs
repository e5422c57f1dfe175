// src/services/calendar.rs

//! Calendar source abstraction and the shared page-walking loop.
//!
//! Both strategies turn a room endpoint into pages of per-day readings.
//! `walk_pages` drives the pagination: it stops once the requested nights
//! are covered, when there is no next page, when a page label repeats, or
//! when the page budget runs out.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{DateRange, Hut, Observation, Room, SourceKind, normalize};
use crate::utils::log::RunLog;

/// One calendar page as read from the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarPage {
    /// Identifying label of the page (month heading, query month, ...)
    pub label: String,

    /// Day readings on this page, in page order
    pub observations: Vec<Observation>,

    /// Where the following page lives, if anywhere
    pub next: Option<String>,

    /// Day elements that could not be read and were skipped
    pub skipped: usize,
}

impl CalendarPage {
    fn last_date(&self) -> Option<NaiveDate> {
        self.observations.iter().map(|o| o.date).max()
    }
}

/// Why a page walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEnd {
    /// The last requested night was observed
    Covered,
    /// The source offered no further page
    NoNextPage,
    /// A page advance returned a page already seen
    Stalled,
    /// The page budget ran out
    PageLimit,
}

/// Result of walking a room's calendar.
#[derive(Debug, Clone)]
pub struct Walk {
    pub observations: Vec<Observation>,
    pub pages: usize,
    pub skipped: usize,
    pub end: WalkEnd,
}

/// Walk calendar pages starting at `start`, collecting observations that
/// fall inside `range`.
///
/// `fetch_page` receives the location of each page. A page without day
/// readings is not an error here: a closed month is a valid page. Whether
/// an empty page means broken markup is up to the strategy.
pub async fn walk_pages<F, Fut>(
    context: &str,
    start: String,
    range: DateRange,
    max_pages: usize,
    mut fetch_page: F,
) -> Result<Walk>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<CalendarPage>>,
{
    let target = range.last_night();
    let mut seen_labels: HashSet<String> = HashSet::new();
    let mut observations = Vec::new();
    let mut skipped = 0;
    let mut pages = 0;
    let mut location = start;

    let end = loop {
        if pages >= max_pages {
            break WalkEnd::PageLimit;
        }

        let page = fetch_page(location).await?;
        pages += 1;

        if !page.label.is_empty() && !seen_labels.insert(page.label.clone()) {
            log::debug!("{}: page '{}' repeated, stopping", context, page.label);
            break WalkEnd::Stalled;
        }

        skipped += page.skipped;
        let last = page.last_date();
        observations.extend(
            page.observations
                .into_iter()
                .filter(|o| range.contains(o.date)),
        );

        if let (Some(target), Some(last)) = (target, last) {
            if last >= target {
                break WalkEnd::Covered;
            }
        }
        match page.next {
            Some(next) => location = next,
            None => break WalkEnd::NoNextPage,
        }
    };

    Ok(Walk {
        observations: normalize(observations),
        pages,
        skipped,
        end,
    })
}

/// A strategy for reading a room's calendar.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Read observations for `room` covering `range`.
    ///
    /// Only observations inside `range` are returned, ordered by date.
    async fn fetch(
        &self,
        hut: &Hut,
        room: &Room,
        range: DateRange,
        run_log: &RunLog,
    ) -> Result<Vec<Observation>>;
}

/// Maps each hut to the strategy that reads it.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<SourceKind, Arc<dyn CalendarSource>>,
    overrides: HashMap<String, Arc<dyn CalendarSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the strategy used for every hut of `kind`.
    pub fn with_source(mut self, kind: SourceKind, source: Arc<dyn CalendarSource>) -> Self {
        self.sources.insert(kind, source);
        self
    }

    /// Register a strategy for one hut key, taking precedence over its kind.
    pub fn with_hut_source(mut self, hut: impl Into<String>, source: Arc<dyn CalendarSource>) -> Self {
        self.overrides.insert(hut.into(), source);
        self
    }

    /// Strategy for a hut, if one is registered.
    pub fn source_for(&self, hut: &Hut) -> Option<Arc<dyn CalendarSource>> {
        self.overrides
            .get(&hut.key)
            .or_else(|| self.sources.get(&hut.source))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    /// Month pages for July..September 2025, each linking to the next.
    fn month_page(location: &str) -> CalendarPage {
        let (label, days, next) = match location {
            "jun" => ("June 2025", 1..=0, Some("jul")),
            "jul" => ("July 2025", 1..=31, Some("aug")),
            "aug" => ("August 2025", 1..=31, Some("sep")),
            "sep" => ("September 2025", 1..=30, None),
            _ => ("", 1..=0, None),
        };
        let month = match location {
            "jul" => 7,
            "aug" => 8,
            _ => 9,
        };
        CalendarPage {
            label: label.to_string(),
            observations: days
                .map(|d| {
                    let date = NaiveDate::from_ymd_opt(2025, month, d).unwrap();
                    Observation::new(date, "Dorm", d % 2 == 0)
                })
                .collect(),
            next: next.map(String::from),
            skipped: 0,
        }
    }

    #[tokio::test]
    async fn test_stops_once_range_is_covered() {
        let range = DateRange::new(date("2025-07-30"), date("2025-08-03"));
        let walk = walk_pages("t", "jul".into(), range, 10, |loc| async move {
            Ok(month_page(&loc))
        })
        .await
        .unwrap();

        assert_eq!(walk.pages, 2);
        assert_eq!(walk.end, WalkEnd::Covered);
        let dates: Vec<_> = walk.observations.iter().map(|o| o.date).collect();
        assert_eq!(dates.first(), Some(&date("2025-07-30")));
        assert_eq!(dates.last(), Some(&date("2025-08-02")));
        assert_eq!(dates.len(), 4);
    }

    #[tokio::test]
    async fn test_stops_without_next_page() {
        let range = DateRange::new(date("2025-09-25"), date("2025-10-05"));
        let walk = walk_pages("t", "jul".into(), range, 10, |loc| async move {
            Ok(month_page(&loc))
        })
        .await
        .unwrap();

        assert_eq!(walk.pages, 3);
        assert_eq!(walk.end, WalkEnd::NoNextPage);
        assert_eq!(walk.observations.len(), 6);
    }

    #[tokio::test]
    async fn test_stops_when_page_does_not_change() {
        let range = DateRange::new(date("2025-07-01"), date("2025-12-01"));
        // "Next" keeps returning the July page.
        let walk = walk_pages("t", "jul".into(), range, 10, |_| async move {
            Ok(month_page("jul"))
        })
        .await
        .unwrap();

        assert_eq!(walk.pages, 2);
        assert_eq!(walk.end, WalkEnd::Stalled);
        assert_eq!(walk.observations.len(), 31);
    }

    #[tokio::test]
    async fn test_page_budget_is_enforced() {
        let range = DateRange::new(date("2025-07-01"), date("2026-12-01"));
        let walk = walk_pages("t", "jul".into(), range, 2, |loc| async move {
            Ok(month_page(&loc))
        })
        .await
        .unwrap();

        assert_eq!(walk.pages, 2);
        assert_eq!(walk.end, WalkEnd::PageLimit);
    }

    #[tokio::test]
    async fn test_closed_month_does_not_end_the_walk() {
        let range = DateRange::new(date("2025-06-28"), date("2025-07-05"));
        let walk = walk_pages("t", "jun".into(), range, 5, |loc| async move {
            Ok(month_page(&loc))
        })
        .await
        .unwrap();

        assert_eq!(walk.pages, 2);
        assert_eq!(walk.end, WalkEnd::Covered);
        let first = walk.observations.first().map(|o| o.date);
        assert_eq!(first, Some(date("2025-07-01")));
        assert_eq!(walk.observations.len(), 4);
    }

    #[tokio::test]
    async fn test_lone_empty_page_yields_nothing() {
        let range = DateRange::new(date("2025-07-01"), date("2025-07-05"));
        let walk = walk_pages("t", "nowhere".into(), range, 5, |loc| async move {
            Ok(month_page(&loc))
        })
        .await
        .unwrap();

        assert_eq!(walk.pages, 1);
        assert_eq!(walk.end, WalkEnd::NoNextPage);
        assert!(walk.observations.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_errors_propagate() {
        let range = DateRange::new(date("2025-07-01"), date("2025-07-05"));
        let result = walk_pages("t", "jul".into(), range, 5, |_| async move {
            Err::<CalendarPage, _>(AppError::fetch("t", "timeout"))
        })
        .await;

        assert!(matches!(result, Err(AppError::Fetch { .. })));
    }
}
