// src/utils/log.rs

//! Run-scoped diagnostics.
//!
//! A `RunLog` belongs to exactly one run. Identical warnings raised during
//! that run are written once; repeats are counted and reported together in
//! the closing summary.

use std::collections::HashMap;
use std::sync::Mutex;

/// Record `message` in `seen` and report whether this is its first sighting.
fn first_sighting(seen: &mut HashMap<String, usize>, message: &str) -> bool {
    match seen.get_mut(message) {
        Some(count) => {
            *count += 1;
            false
        }
        None => {
            seen.insert(message.to_string(), 1);
            true
        }
    }
}

/// Deduplicating diagnostic sink for one run.
#[derive(Debug, Default)]
pub struct RunLog {
    seen: Mutex<HashMap<String, usize>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, message: &str) -> bool {
        match self.seen.lock() {
            Ok(mut seen) => first_sighting(&mut seen, message),
            Err(poisoned) => first_sighting(&mut poisoned.into_inner(), message),
        }
    }

    /// Log a warning unless the same text was already logged this run.
    pub fn warn(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        if self.record(message) {
            log::warn!("{}", message);
        }
    }

    /// Log an error unless the same text was already logged this run.
    pub fn error(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        if self.record(message) {
            log::error!("{}", message);
        }
    }

    /// Messages that were suppressed at least once, with total occurrences.
    pub fn repeated(&self) -> Vec<(String, usize)> {
        let seen = match self.seen.lock() {
            Ok(seen) => seen.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let mut repeated: Vec<(String, usize)> =
            seen.into_iter().filter(|(_, count)| *count > 1).collect();
        repeated.sort();
        repeated
    }

    /// Report suppressed repeats, if any, and forget them.
    pub fn flush_repeats(&self) {
        for (message, count) in self.repeated() {
            log::warn!("(repeated {}x) {}", count, message);
        }
        match self.seen.lock() {
            Ok(mut seen) => seen.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

/// Log a summary section.
pub fn summary(title: &str, items: &[(&str, String)]) {
    log::info!("[SUMMARY] {}", title);
    for (key, value) in items {
        log::info!("    {}: {}", key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sighting() {
        let mut seen = HashMap::new();
        assert!(first_sighting(&mut seen, "No url for room Dorm"));
        assert!(!first_sighting(&mut seen, "No url for room Dorm"));
        assert!(first_sighting(&mut seen, "No url for room Private"));
        assert_eq!(seen["No url for room Dorm"], 2);
    }

    #[test]
    fn test_repeats_are_counted_per_instance() {
        let log = RunLog::new();
        log.warn("unknown hut 'foo'");
        log.warn("unknown hut 'foo'");
        log.warn("unknown hut 'foo'");
        log.warn("unknown hut 'bar'");

        assert_eq!(log.repeated(), vec![("unknown hut 'foo'".to_string(), 3)]);

        let fresh = RunLog::new();
        assert!(fresh.repeated().is_empty());
    }

    #[test]
    fn test_flush_forgets_repeats() {
        let log = RunLog::new();
        log.error("ledger locked");
        log.error("ledger locked");
        log.flush_repeats();

        assert!(log.repeated().is_empty());
    }
}
