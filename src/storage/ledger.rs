//! Notification ledger implementations.
//!
//! `SqliteLedger` keeps one row per (email, hut, date) under a primary key,
//! so insert-if-absent holds across every connection to the same database
//! file, including separate processes running overlapping schedules.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{AppError, Result};
use crate::models::{NotificationKey, NotificationRecord};
use crate::storage::{MarkOutcome, NotificationLedger};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS notifications (
        email       TEXT NOT NULL,
        hut         TEXT NOT NULL,
        date        TEXT NOT NULL,
        notified_at TEXT NOT NULL,
        PRIMARY KEY (email, hut, date)
    );
";

/// How long a write waits for another connection's lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed ledger.
#[derive(Debug)]
pub struct SqliteLedger {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open (or create) the ledger database at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&path).map_err(|e| store_error(&path, e))?;
        Self::init(path, conn)
    }

    fn init(path: PathBuf, conn: Connection) -> Result<Self> {
        let prepare = |conn: &Connection| -> rusqlite::Result<()> {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
            conn.execute_batch(SCHEMA)
        };
        prepare(&conn).map_err(|e| store_error(&path, e))?;
        log::debug!("Ledger open at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::store(format!("ledger {} lock poisoned", self.path.display())))
    }
}

fn store_error(path: impl AsRef<Path>, e: rusqlite::Error) -> AppError {
    AppError::store(format!("ledger {}: {e}", path.as_ref().display()))
}

#[async_trait]
impl NotificationLedger for SqliteLedger {
    async fn has_been_notified(&self, email: &str, hut: &str, date: NaiveDate) -> Result<bool> {
        let key = NotificationKey::new(email, hut, date);
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM notifications WHERE email = ?1 AND hut = ?2 AND date = ?3",
                params![key.email, key.hut, key.date],
                |_| Ok(()),
            )
            .optional()
            .map_err(|e| store_error(&self.path, e))?;
        Ok(found.is_some())
    }

    async fn mark_notified(&self, email: &str, hut: &str, date: NaiveDate) -> Result<MarkOutcome> {
        let key = NotificationKey::new(email, hut, date);
        let conn = self.conn()?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO notifications (email, hut, date, notified_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![key.email, key.hut, key.date, Utc::now()],
            )
            .map_err(|e| store_error(&self.path, e))?;
        Ok(if inserted == 0 {
            MarkOutcome::AlreadyPresent
        } else {
            MarkOutcome::Inserted
        })
    }

    async fn records(&self) -> Result<Vec<NotificationRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT email, hut, date, notified_at FROM notifications
                 ORDER BY email, hut, date",
            )
            .map_err(|e| store_error(&self.path, e))?;
        let records = stmt
            .query_map([], |row| {
                Ok(NotificationRecord {
                    key: NotificationKey {
                        email: row.get(0)?,
                        hut: row.get(1)?,
                        date: row.get::<_, NaiveDate>(2)?,
                    },
                    notified_at: row.get::<_, DateTime<Utc>>(3)?,
                })
            })
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| store_error(&self.path, e))?;
        Ok(records)
    }
}

/// In-memory ledger for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: tokio::sync::Mutex<BTreeMap<NotificationKey, NotificationRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl NotificationLedger for MemoryLedger {
    async fn has_been_notified(&self, email: &str, hut: &str, date: NaiveDate) -> Result<bool> {
        let key = NotificationKey::new(email, hut, date);
        Ok(self.records.lock().await.contains_key(&key))
    }

    async fn mark_notified(&self, email: &str, hut: &str, date: NaiveDate) -> Result<MarkOutcome> {
        let key = NotificationKey::new(email, hut, date);
        let mut records = self.records.lock().await;
        if records.contains_key(&key) {
            return Ok(MarkOutcome::AlreadyPresent);
        }
        records.insert(
            key.clone(),
            NotificationRecord {
                key,
                notified_at: Utc::now(),
            },
        );
        Ok(MarkOutcome::Inserted)
    }

    async fn records(&self) -> Result<Vec<NotificationRecord>> {
        Ok(self.records.lock().await.values().cloned().collect())
    }
}
