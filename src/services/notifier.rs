// src/services/notifier.rs

//! Subscriber notifications.
//!
//! One message per (subscriber, hut) per run. Dates are listed in ascending
//! order; for huts with several room types, dates are grouped under each
//! room's name.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::{AppError, Result};
use crate::models::{BatchEntry, Hut, NotificationBatch, SmtpConfig};

/// A rendered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composed {
    pub subject: String,
    pub body: String,
}

/// Render one line per night, merging that night's slots.
fn date_lines(entries: &[&BatchEntry]) -> Vec<String> {
    let mut by_date: BTreeMap<NaiveDate, Vec<String>> = BTreeMap::new();
    for entry in entries {
        let slots = by_date.entry(entry.date).or_default();
        if let Some(slot) = &entry.slot {
            slots.push(slot.describe());
        }
    }
    by_date
        .into_iter()
        .map(|(date, slots)| {
            if slots.is_empty() {
                date.to_string()
            } else {
                format!("{}: {}", date, slots.join(", "))
            }
        })
        .collect()
}

/// Build the subject and body for a batch.
pub fn compose(hut: &Hut, batch: &NotificationBatch) -> Composed {
    let name = hut.display_name();
    let groups = batch.by_room();

    let mut body = String::from("Hello,\n\n");
    body.push_str(&format!(
        "The following dates are now available for {name}:\n\n"
    ));

    if hut.has_multiple_rooms() {
        for (room, entries) in &groups {
            body.push_str(&format!("{room}:\n"));
            for line in date_lines(entries) {
                body.push_str(&format!("  {line}\n"));
            }
            body.push('\n');
        }
    } else {
        for entries in groups.values() {
            for line in date_lines(entries) {
                body.push_str(&format!("{line}\n"));
            }
        }
        body.push('\n');
    }

    body.push_str("Book ASAP to secure your spot!\n");
    let links: Vec<&str> = batch
        .rooms()
        .into_iter()
        .filter_map(|room| hut.room(room))
        .map(|room| room.url.as_str())
        .filter(|url| !url.is_empty())
        .collect();
    for link in links {
        body.push_str(&format!("{link}\n"));
    }

    Composed {
        subject: format!("⛺ {name} Availability Alert"),
        body,
    }
}

/// Delivers batches to subscribers.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one message covering the whole batch. An `Err` means the
    /// subscriber may not have received it.
    async fn send(&self, email: &str, hut: &Hut, batch: &NotificationBatch) -> Result<()>;
}

/// Sends notifications over SMTP.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    /// Build the transport. The password is read from the environment
    /// variable named in the configuration.
    pub fn from_config(config: &SmtpConfig) -> Result<Self> {
        if config.from.trim().is_empty() {
            return Err(AppError::config("smtp.from is empty"));
        }
        let from: Mailbox = config.from.parse()?;
        let username = if config.username.trim().is_empty() {
            config.from.clone()
        } else {
            config.username.clone()
        };
        let credentials = Credentials::new(username, config.password()?);

        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        };
        let transport = builder
            .port(config.port)
            .credentials(credentials)
            .timeout(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, email: &str, hut: &Hut, batch: &NotificationBatch) -> Result<()> {
        let composed = compose(hut, batch);
        let message = Message::builder()
            .from(self.from.clone())
            .to(email.parse()?)
            .subject(composed.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(composed.body)?;

        let response = self.transport.send(message).await?;
        if !response.is_positive() {
            return Err(AppError::notify(format!(
                "SMTP server rejected message to {email}: {:?}",
                response.code()
            )));
        }
        log::info!(
            "Alert sent to {} for {}: {} night(s)",
            email,
            hut.key,
            batch.dates().len()
        );
        Ok(())
    }
}

/// Logs notifications instead of sending them.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, email: &str, hut: &Hut, batch: &NotificationBatch) -> Result<()> {
        let composed = compose(hut, batch);
        log::info!("[dry run] To: {} | {}", email, composed.subject);
        for line in composed.body.lines() {
            log::info!("[dry run]   {}", line);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Room, SlotDetail, SourceKind};

    fn hut(rooms: &[&str]) -> Hut {
        Hut {
            key: "osada_sanso".into(),
            name: None,
            source: SourceKind::Scrape,
            selectors: None,
            rooms: rooms
                .iter()
                .map(|r| Room {
                    name: r.to_string(),
                    url: format!("https://example.com/{}", r.to_lowercase()),
                })
                .collect(),
        }
    }

    fn entry(date: &str, room: &str, slot: Option<(&str, u32)>) -> BatchEntry {
        BatchEntry {
            date: date.parse().unwrap(),
            room: room.into(),
            slot: slot.map(|(time, n)| SlotDetail {
                time: time.into(),
                remaining: Some(n),
            }),
        }
    }

    #[test]
    fn test_single_room_message() {
        let batch = NotificationBatch::from_entries(vec![
            entry("2025-07-15", "Dorm", None),
            entry("2025-07-14", "Dorm", None),
        ]);
        let composed = compose(&hut(&["Dorm"]), &batch);

        assert_eq!(composed.subject, "⛺ Osada Sanso Availability Alert");
        assert_eq!(
            composed.body,
            "Hello,\n\n\
             The following dates are now available for Osada Sanso:\n\n\
             2025-07-14\n\
             2025-07-15\n\n\
             Book ASAP to secure your spot!\n\
             https://example.com/dorm\n"
        );
    }

    #[test]
    fn test_multi_room_message_groups_by_room() {
        let batch = NotificationBatch::from_entries(vec![
            entry("2025-07-15", "Private", None),
            entry("2025-07-14", "Dorm", Some(("06:00", 3))),
            entry("2025-07-14", "Dorm", Some(("07:30", 1))),
            entry("2025-07-14", "Private", None),
        ]);
        let composed = compose(&hut(&["Dorm", "Private"]), &batch);

        let dorm = composed.body.find("Dorm:\n  2025-07-14: 06:00 (3 left), 07:30 (1 left)\n");
        let private = composed.body.find("Private:\n  2025-07-14\n  2025-07-15\n");
        assert!(dorm.is_some(), "{}", composed.body);
        assert!(private.is_some(), "{}", composed.body);
        assert!(dorm < private);
        assert!(composed.body.contains("https://example.com/dorm\nhttps://example.com/private\n"));
    }

    #[test]
    fn test_multi_room_hut_keeps_heading_for_one_room() {
        let batch = NotificationBatch::from_entries(vec![entry("2025-07-14", "Private", None)]);
        let composed = compose(&hut(&["Dorm", "Private"]), &batch);

        assert!(composed.body.contains("Private:\n  2025-07-14\n\n"));
        assert!(!composed.body.contains("Dorm"));
    }

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        let batch = NotificationBatch::from_entries(vec![entry("2025-07-14", "Dorm", None)]);
        assert!(LogNotifier.send("a@x.com", &hut(&["Dorm"]), &batch).await.is_ok());
    }
}
