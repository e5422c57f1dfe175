// src/services/api.rs

//! JSON availability API strategy.
//!
//! Queries the room endpoint one month at a time (`?month=YYYY-MM`) and
//! reads a payload of the form:
//!
//! ```json
//! { "days": [ { "date": "2025-07-14", "available": true,
//!               "slots": [ { "time": "06:00", "remaining": 3 } ] } ] }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Months, NaiveDate};
use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, DateRange, Hut, Observation, Room, SlotDetail};
use crate::services::calendar::{CalendarPage, CalendarSource, walk_pages};
use crate::utils::http::fetch_json;
use crate::utils::log::RunLog;
use crate::utils::retry::{RetryPolicy, retry};

/// URL of the page for the month containing `month`.
pub fn month_url(endpoint: &str, param: &str, month: NaiveDate) -> Result<String> {
    let mut url = Url::parse(endpoint)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != param)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(param, &month.format("%Y-%m").to_string());
    Ok(url.to_string())
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn parse_slot(value: &Value) -> Option<SlotDetail> {
    let time = value.get("time")?.as_str()?.trim();
    if time.is_empty() {
        return None;
    }
    let remaining = value
        .get("remaining")
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok());
    Some(SlotDetail {
        time: time.to_string(),
        remaining,
    })
}

/// Parse one month payload.
///
/// A payload without a `days` array is a structural error. Individual
/// entries with an unreadable date are skipped and counted; a missing
/// `available` flag reads as "not available".
pub fn parse_month_payload(
    payload: &Value,
    label: &str,
    room: &str,
    context: &str,
) -> Result<CalendarPage> {
    let days = payload
        .get("days")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::structure(context, "payload has no 'days' array"))?;

    let mut observations = Vec::new();
    let mut skipped = 0;
    for day in days {
        let Some(date) = day
            .get("date")
            .and_then(Value::as_str)
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
        else {
            skipped += 1;
            continue;
        };
        let available = day
            .get("available")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let slots: Vec<SlotDetail> = if available {
            day.get("slots")
                .and_then(Value::as_array)
                .map(|slots| slots.iter().filter_map(parse_slot).collect())
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        if slots.is_empty() {
            observations.push(Observation::new(date, room, available));
        } else {
            observations.extend(
                slots
                    .into_iter()
                    .map(|slot| Observation::new(date, room, true).with_slot(slot)),
            );
        }
    }

    Ok(CalendarPage {
        label: label.to_string(),
        observations,
        next: None,
        skipped,
    })
}

/// Reads availability from a month-indexed JSON endpoint.
pub struct ApiSource {
    client: Client,
    config: Arc<CrawlerConfig>,
}

impl ApiSource {
    pub fn new(client: Client, config: Arc<CrawlerConfig>) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl CalendarSource for ApiSource {
    async fn fetch(
        &self,
        hut: &Hut,
        room: &Room,
        range: DateRange,
        run_log: &RunLog,
    ) -> Result<Vec<Observation>> {
        let context = format!("{}/{}", hut.key, room.name);
        let Some(last_night) = range.last_night() else {
            return Ok(Vec::new());
        };
        let first_month = first_of_month(range.start);
        let last_month = first_of_month(last_night);
        let param = self.config.month_param.as_str();
        let policy = RetryPolicy::from_config(&self.config);

        let start = month_url(&room.url, param, first_month)?;
        let walk = walk_pages(
            &context,
            start,
            range,
            self.config.max_pages,
            |location| {
                let client = &self.client;
                let context = &context;
                let endpoint = room.url.as_str();
                let room_name = room.name.as_str();
                async move {
                    let payload =
                        retry(policy, context, || fetch_json(client, &location)).await?;
                    let month = Url::parse(&location)?
                        .query_pairs()
                        .find(|(k, _)| k == param)
                        .and_then(|(_, v)| {
                            NaiveDate::parse_from_str(&format!("{v}-01"), "%Y-%m-%d").ok()
                        })
                        .ok_or_else(|| AppError::structure(context, "lost month parameter"))?;

                    let mut page = parse_month_payload(
                        &payload,
                        &month.format("%Y-%m").to_string(),
                        room_name,
                        context,
                    )?;
                    if month < last_month {
                        if let Some(following) = month.checked_add_months(Months::new(1)) {
                            page.next = Some(month_url(endpoint, param, following)?);
                        }
                    }
                    Ok(page)
                }
            },
        )
        .await?;

        if walk.skipped > 0 {
            run_log.warn(format!(
                "{}: skipped {} unreadable day entr(ies)",
                context, walk.skipped
            ));
        }
        log::debug!(
            "{}: {} observation(s) from {} month(s), ended {:?}",
            context,
            walk.observations.len(),
            walk.pages,
            walk.end
        );
        Ok(walk.observations)
    }
}
