//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Hut, HutTable, SourceKind};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and calendar fetching behavior
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Outbound mail settings
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Store locations, relative to the storage directory
    #[serde(default)]
    pub paths: PathsConfig,

    /// Hut definitions
    #[serde(default = "defaults::default_huts")]
    pub huts: Vec<Hut>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Build the read-only hut lookup table.
    pub fn hut_table(&self) -> Result<HutTable> {
        HutTable::new(self.huts.clone())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.crawler.max_pages == 0 {
            return Err(AppError::validation("crawler.max_pages must be > 0"));
        }
        if self.crawler.retry_attempts == 0 {
            return Err(AppError::validation("crawler.retry_attempts must be > 0"));
        }
        if self.huts.is_empty() {
            return Err(AppError::validation("No huts defined"));
        }

        let mut keys = HashSet::new();
        for hut in &self.huts {
            if hut.key.trim().is_empty() {
                return Err(AppError::validation("hut with empty key"));
            }
            if !keys.insert(hut.key.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate hut key '{}'",
                    hut.key
                )));
            }
            if hut.rooms.is_empty() {
                return Err(AppError::validation(format!(
                    "hut '{}' has no rooms",
                    hut.key
                )));
            }
            for room in &hut.rooms {
                if room.url.trim().is_empty() {
                    return Err(AppError::validation(format!(
                        "room '{}' of hut '{}' has no url",
                        room.name, hut.key
                    )));
                }
                url::Url::parse(&room.url)?;
            }
            if hut.source == SourceKind::Scrape {
                for selector in hut.selectors().all() {
                    scraper::Selector::parse(selector)
                        .map_err(|e| AppError::selector(selector, format!("{e:?}")))?;
                }
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            smtp: SmtpConfig::default(),
            paths: PathsConfig::default(),
            huts: defaults::default_huts(),
        }
    }
}

/// HTTP client and calendar fetching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between room fetches in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum concurrent room fetches
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Upper bound on calendar pages read per room
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,

    /// Attempts per page request, including the first
    #[serde(default = "defaults::retry_attempts")]
    pub retry_attempts: u32,

    /// Base backoff between attempts in milliseconds (grows linearly)
    #[serde(default = "defaults::retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Query parameter carrying the month for the api strategy
    #[serde(default = "defaults::month_param")]
    pub month_param: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
            max_pages: defaults::max_pages(),
            retry_attempts: defaults::retry_attempts(),
            retry_backoff_ms: defaults::retry_backoff(),
            month_param: defaults::month_param(),
        }
    }
}

/// SMTP settings for the mail notifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "defaults::smtp_host")]
    pub host: String,

    #[serde(default = "defaults::smtp_port")]
    pub port: u16,

    /// Login user; usually the sender address
    #[serde(default)]
    pub username: String,

    /// Environment variable holding the SMTP password
    #[serde(default = "defaults::password_env")]
    pub password_env: String,

    /// Sender address
    #[serde(default)]
    pub from: String,

    /// Use STARTTLS instead of implicit TLS
    #[serde(default)]
    pub starttls: bool,

    /// Connection timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: defaults::smtp_host(),
            port: defaults::smtp_port(),
            username: String::new(),
            password_env: defaults::password_env(),
            from: String::new(),
            starttls: false,
            timeout_secs: defaults::timeout(),
        }
    }
}

impl SmtpConfig {
    /// Read the password from the configured environment variable.
    pub fn password(&self) -> Result<String> {
        std::env::var(&self.password_env).map_err(|_| {
            AppError::config(format!(
                "SMTP password variable {} is not set",
                self.password_env
            ))
        })
    }
}

/// File names of the durable stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::subscriptions_file")]
    pub subscriptions_file: String,

    #[serde(default = "defaults::ledger_file")]
    pub ledger_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            subscriptions_file: defaults::subscriptions_file(),
            ledger_file: defaults::ledger_file(),
        }
    }
}

impl PathsConfig {
    pub fn subscriptions_path(&self, storage_dir: &Path) -> PathBuf {
        storage_dir.join(&self.subscriptions_file)
    }

    pub fn ledger_path(&self, storage_dir: &Path) -> PathBuf {
        storage_dir.join(&self.ledger_file)
    }
}

mod defaults {
    use crate::models::{Hut, Room, SourceKind};

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; hutwatch/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        250
    }
    pub fn max_concurrent() -> usize {
        3
    }
    pub fn max_pages() -> usize {
        24
    }
    pub fn retry_attempts() -> u32 {
        3
    }
    pub fn retry_backoff() -> u64 {
        500
    }
    pub fn month_param() -> String {
        "month".into()
    }

    // SMTP defaults
    pub fn smtp_host() -> String {
        "smtp.gmail.com".into()
    }
    pub fn smtp_port() -> u16 {
        465
    }
    pub fn password_env() -> String {
        "EMAIL_PASS".into()
    }

    // Path defaults
    pub fn subscriptions_file() -> String {
        "subscriptions.toml".into()
    }
    pub fn ledger_file() -> String {
        "ledger.db".into()
    }

    // Hut defaults
    const PEEK_BASE: &str = "https://book.peek.com/s/9846cbab-98f5-477d-b7d1-1ab5928778ff";

    fn peek_hut(key: &str, path: &str) -> Hut {
        Hut {
            key: key.to_string(),
            name: None,
            source: SourceKind::Scrape,
            selectors: None,
            rooms: vec![Room {
                name: "Standard".to_string(),
                url: format!("{PEEK_BASE}/{path}"),
            }],
        }
    }

    pub fn default_huts() -> Vec<Hut> {
        vec![
            peek_hut("kamaiwakan", "vP9OM"),
            peek_hut("taiyokan", "ZYLbB"),
            peek_hut(
                "miharashikan",
                "p_y83bej--a732d212-bdb2-49c9-afee-3cb1a8b7c6b7?mode=standalone",
            ),
            peek_hut("yamaguchiya", "dy9Me"),
            peek_hut(
                "setokan",
                "p_9bn546--ce658958-2895-4b71-abec-6fb1d2097fc7?mode=standalone",
            ),
            peek_hut("yoshinoya", "l7Wve"),
            peek_hut("osada_sanso", "rb3b4"),
            peek_hut("higashi_fuji_sanso", "8aMap"),
            Hut {
                key: "fuji_mountain_guides".to_string(),
                name: Some("Fuji Mountain Guides".to_string()),
                source: SourceKind::Scrape,
                selectors: None,
                rooms: vec![Room {
                    name: "Two-Day Tour".to_string(),
                    url: "https://www.fujimountainguides.com/two-day-mt-fuji-tour.html"
                        .to_string(),
                }],
            },
        ]
    }
}
