//! Utility functions and helpers.

pub mod http;
pub mod log;
pub mod retry;

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

fn iso_date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("valid date regex"))
}

/// Find the first valid ISO `YYYY-MM-DD` date inside free text.
pub fn extract_iso_date(text: &str) -> Option<NaiveDate> {
    iso_date_pattern()
        .find_iter(text)
        .find_map(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
}

/// Collapse runs of whitespace into single spaces.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/path/").unwrap();
        assert_eq!(
            resolve_url(&base, "page.html"),
            "https://example.com/path/page.html"
        );
        assert_eq!(
            resolve_url(&base, "/root.html"),
            "https://example.com/root.html"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_extract_iso_date() {
        assert_eq!(
            extract_iso_date("Available on 2025-07-14, book now"),
            Some("2025-07-14".parse().unwrap())
        );
        assert_eq!(extract_iso_date("2025-13-40 then 2025-07-15"), "2025-07-15".parse().ok());
        assert_eq!(extract_iso_date("July 14"), None);
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  July\n   2025 "), "July 2025");
    }
}
