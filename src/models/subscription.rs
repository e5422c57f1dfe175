// src/models/subscription.rs

//! Subscriber requests and the half-open night ranges they cover.

use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// A half-open range of nights: `start` inclusive, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Whether `date` is one of the requested nights.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// True when the range covers no nights at all.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// The last night inside the range, if any.
    pub fn last_night(&self) -> Option<NaiveDate> {
        if self.is_empty() {
            None
        } else {
            self.end.checked_sub_days(Days::new(1))
        }
    }

    /// Number of nights covered.
    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days().max(0)
    }

    /// Smallest range covering both `self` and `other`.
    ///
    /// Empty ranges are absorbed rather than stretching the result.
    pub fn union(&self, other: &DateRange) -> DateRange {
        match (self.is_empty(), other.is_empty()) {
            (true, _) => *other,
            (_, true) => *self,
            _ => DateRange {
                start: self.start.min(other.start),
                end: self.end.max(other.end),
            },
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A subscriber's request to hear about open nights at one hut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscriber email address
    pub email: String,

    /// Hut key, matching a `[[huts]]` entry in the configuration
    pub hut: String,

    /// First requested night
    pub start_date: NaiveDate,

    /// Morning of departure; this night is not requested
    pub end_date: NaiveDate,
}

impl Subscription {
    /// Requested nights as a half-open range.
    pub fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_end_date_is_exclusive() {
        let range = DateRange::new(date("2025-07-10"), date("2025-07-12"));
        assert!(range.contains(date("2025-07-10")));
        assert!(range.contains(date("2025-07-11")));
        assert!(!range.contains(date("2025-07-12")));
        assert!(!range.contains(date("2025-07-09")));
        assert_eq!(range.nights(), 2);
        assert_eq!(range.last_night(), Some(date("2025-07-11")));
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let range = DateRange::new(date("2025-07-12"), date("2025-07-12"));
        assert!(range.is_empty());
        assert_eq!(range.last_night(), None);
        assert_eq!(range.nights(), 0);
        assert!(!range.contains(date("2025-07-12")));
    }

    #[test]
    fn test_union_ignores_empty_ranges() {
        let a = DateRange::new(date("2025-07-10"), date("2025-07-12"));
        let b = DateRange::new(date("2025-08-01"), date("2025-08-03"));
        let empty = DateRange::new(date("2026-01-01"), date("2025-01-01"));

        assert_eq!(a.union(&b), DateRange::new(date("2025-07-10"), date("2025-08-03")));
        assert_eq!(a.union(&empty), a);
        assert_eq!(empty.union(&b), b);
    }
}
