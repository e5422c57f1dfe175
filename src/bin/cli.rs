//! Hutwatch CLI
//!
//! Local execution entry point, meant to be run on a schedule.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use hutwatch::{
    error::{AppError, Result},
    models::{Config, SourceKind},
    pipeline::{RunOptions, Watcher},
    services::{ApiSource, LogNotifier, Notifier, ScrapeSource, SmtpNotifier, SourceRegistry},
    storage::{FileSubscriptions, NotificationLedger, SqliteLedger, SubscriptionSource},
    utils::{http, log::summary},
};

/// Hutwatch - Mountain Hut Availability Watcher
#[derive(Parser, Debug)]
#[command(
    name = "hutwatch",
    version,
    about = "Watches mountain hut booking calendars and emails subscribers"
)]
struct Cli {
    /// Path to storage directory containing config, subscriptions and ledger
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch calendars, send alerts, and record them
    Run,

    /// Dry run: log the alerts that would be sent, record nothing
    Check,

    /// Validate configuration and subscriptions
    Validate,

    /// Show ledger and subscription statistics
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Calendar strategies sharing one HTTP client.
fn build_registry(config: &Config) -> Result<SourceRegistry> {
    let client = http::create_client(&config.crawler)?;
    let crawler = Arc::new(config.crawler.clone());
    Ok(SourceRegistry::new()
        .with_source(
            SourceKind::Scrape,
            Arc::new(ScrapeSource::new(client.clone(), Arc::clone(&crawler))),
        )
        .with_source(SourceKind::Api, Arc::new(ApiSource::new(client, crawler))))
}

async fn watch(config: &Config, storage_dir: &Path, dry_run: bool) -> Result<()> {
    let huts = config.hut_table()?;
    let registry = build_registry(config)?;
    let ledger = SqliteLedger::open(config.paths.ledger_path(storage_dir))?;
    let subscriptions = FileSubscriptions::new(config.paths.subscriptions_path(storage_dir));

    let notifier: Box<dyn Notifier> = if dry_run {
        Box::new(LogNotifier)
    } else {
        Box::new(SmtpNotifier::from_config(&config.smtp)?)
    };

    let options = RunOptions::from_config(&config.crawler, dry_run);
    Watcher::new(&huts, &registry, &ledger, notifier.as_ref(), options)
        .run(&subscriptions)
        .await?;
    Ok(())
}

async fn validate(config: &Config, storage_dir: &Path) -> Result<()> {
    log::info!("Validating configuration...");
    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }
    let huts = config.hut_table()?;
    log::info!(
        "✓ Config OK ({} huts, {} rooms)",
        huts.hut_count(),
        huts.room_count()
    );

    let path = config.paths.subscriptions_path(storage_dir);
    let subscriptions = FileSubscriptions::new(&path).load().await?;
    let mut problems = 0;
    for sub in &subscriptions {
        if huts.get(&sub.hut).is_none() {
            log::warn!("Subscription for {}: unknown hut '{}'", sub.email, sub.hut);
            problems += 1;
        }
        if sub.range().is_empty() {
            log::warn!(
                "Subscription for {} at {}: empty range {}",
                sub.email,
                sub.hut,
                sub.range()
            );
            problems += 1;
        }
        if sub.email.parse::<lettre::Address>().is_err() {
            log::warn!("Subscription for {}: not a valid email address", sub.email);
            problems += 1;
        }
    }
    if problems > 0 {
        return Err(AppError::validation(format!(
            "{} problem(s) in {}",
            problems,
            path.display()
        )));
    }
    log::info!("✓ Subscriptions OK ({})", subscriptions.len());

    log::info!("All validations passed!");
    Ok(())
}

async fn info(config: &Config, storage_dir: &Path) -> Result<()> {
    log::info!("Storage directory: {}", storage_dir.display());

    let subs_path = config.paths.subscriptions_path(storage_dir);
    if subs_path.exists() {
        let subscriptions = FileSubscriptions::new(&subs_path).load().await?;
        let mut per_hut: BTreeMap<&str, usize> = BTreeMap::new();
        for sub in &subscriptions {
            *per_hut.entry(sub.hut.as_str()).or_default() += 1;
        }
        let items: Vec<(&str, String)> = per_hut
            .into_iter()
            .map(|(hut, count)| (hut, count.to_string()))
            .collect();
        summary(&format!("{} subscription(s)", subscriptions.len()), &items);
    } else {
        log::info!("No subscriptions file at {}", subs_path.display());
    }

    let ledger_path = config.paths.ledger_path(storage_dir);
    if !ledger_path.exists() {
        log::info!("No ledger at {} yet.", ledger_path.display());
        return Ok(());
    }
    let ledger = SqliteLedger::open(ledger_path)?;
    log::info!("Ledger: {}", ledger.path().display());
    let records = ledger.records().await?;
    if records.is_empty() {
        log::info!("No notifications recorded yet.");
        return Ok(());
    }
    let subscribers = records
        .iter()
        .map(|r| r.key.email.as_str())
        .collect::<std::collections::BTreeSet<_>>()
        .len();
    let last = records.iter().map(|r| r.notified_at).max();
    summary(
        "Ledger",
        &[
            ("Records", records.len().to_string()),
            ("Subscribers notified", subscribers.to_string()),
            (
                "Last notified",
                last.map(|t| t.to_rfc3339()).unwrap_or_default(),
            ),
        ],
    );
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("Hutwatch starting...");

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    log::info!("Loaded configuration from {}", cli.storage_dir.display());

    let result = match cli.command {
        Command::Run => watch(&config, &cli.storage_dir, false).await,
        Command::Check => watch(&config, &cli.storage_dir, true).await,
        Command::Validate => validate(&config, &cli.storage_dir).await,
        Command::Info => info(&config, &cli.storage_dir).await,
    };

    if let Err(e) = &result {
        log::error!("{}", e.report());
        return result;
    }

    log::info!("Done!");
    Ok(())
}
