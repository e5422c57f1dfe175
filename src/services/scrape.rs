// src/services/scrape.rs

//! HTML calendar scraping strategy.
//!
//! Reads month pages of a booking calendar with configurable CSS selectors.
//! Every day cell is read on its own; a cell that cannot be read is skipped
//! and counted without affecting the rest of the page.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{
    CalendarSelectors, CrawlerConfig, DateRange, Hut, Observation, Room, SlotDetail,
};
use crate::services::calendar::{CalendarPage, CalendarSource, walk_pages};
use crate::utils::http::fetch_text;
use crate::utils::log::RunLog;
use crate::utils::retry::{RetryPolicy, retry};
use crate::utils::{extract_iso_date, normalize_whitespace, resolve_url};

/// Parsed form of `CalendarSelectors`.
#[derive(Debug)]
pub struct CompiledSelectors {
    day: Selector,
    date_attr: String,
    available_class: String,
    label: Selector,
    next: Selector,
    next_attr: String,
    slot: Option<Selector>,
    slot_time: Option<Selector>,
    slot_remaining: Option<Selector>,
}

impl CompiledSelectors {
    pub fn compile(selectors: &CalendarSelectors) -> Result<Self> {
        let optional = |s: &Option<String>| s.as_deref().map(parse_selector).transpose();
        Ok(Self {
            day: parse_selector(&selectors.day_selector)?,
            date_attr: selectors.date_attr.clone(),
            available_class: selectors.available_class.clone(),
            label: parse_selector(&selectors.label_selector)?,
            next: parse_selector(&selectors.next_selector)?,
            next_attr: selectors.next_attr.clone(),
            slot: optional(&selectors.slot_selector)?,
            slot_time: optional(&selectors.slot_time_selector)?,
            slot_remaining: optional(&selectors.slot_remaining_selector)?,
        })
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

fn text_of(element: &ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

/// Read the date of a day cell from its attribute, aria-label, or text.
fn day_date(cell: &ElementRef<'_>, date_attr: &str) -> Option<NaiveDate> {
    cell.value()
        .attr(date_attr)
        .and_then(extract_iso_date)
        .or_else(|| cell.value().attr("aria-label").and_then(extract_iso_date))
        .or_else(|| extract_iso_date(&text_of(cell)))
}

fn has_class(cell: &ElementRef<'_>, class: &str) -> bool {
    cell.value().classes().any(|c| c == class)
}

fn first_number(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Time slots listed inside an available day cell.
fn day_slots(cell: &ElementRef<'_>, selectors: &CompiledSelectors) -> Vec<SlotDetail> {
    let Some(slot_sel) = &selectors.slot else {
        return Vec::new();
    };
    cell.select(slot_sel)
        .filter_map(|slot| {
            let time = match &selectors.slot_time {
                Some(sel) => slot.select(sel).next().map(|e| text_of(&e)),
                None => Some(text_of(&slot)),
            }
            .filter(|t| !t.is_empty())?;
            let remaining = selectors
                .slot_remaining
                .as_ref()
                .and_then(|sel| slot.select(sel).next())
                .and_then(|e| first_number(&text_of(&e)));
            Some(SlotDetail { time, remaining })
        })
        .collect()
}

/// Parse one calendar page.
///
/// Day cells without a readable date are skipped and counted. A cell that
/// lacks the availability class is read as "not available".
pub fn parse_calendar_page(
    html: &str,
    page_url: &str,
    room: &str,
    selectors: &CompiledSelectors,
) -> CalendarPage {
    let document = Html::parse_document(html);
    let mut observations = Vec::new();
    let mut skipped = 0;

    for cell in document.select(&selectors.day) {
        let Some(date) = day_date(&cell, &selectors.date_attr) else {
            skipped += 1;
            continue;
        };
        let available = has_class(&cell, &selectors.available_class);
        let slots = if available {
            day_slots(&cell, selectors)
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

    let label = document
        .select(&selectors.label)
        .next()
        .map(|e| text_of(&e))
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| fallback_label(&observations));

    let next = document
        .select(&selectors.next)
        .next()
        .and_then(|e| e.value().attr(&selectors.next_attr))
        .filter(|href| !href.trim().is_empty() && *href != "#")
        .and_then(|href| {
            let resolved = match Url::parse(page_url) {
                Ok(base) => resolve_url(&base, href),
                Err(_) => href.to_string(),
            };
            (resolved != page_url).then_some(resolved)
        });

    CalendarPage {
        label,
        observations,
        next,
        skipped,
    }
}

/// Label derived from the dates on a page when it has no heading.
fn fallback_label(observations: &[Observation]) -> String {
    let first = observations.iter().map(|o| o.date).min();
    let last = observations.iter().map(|o| o.date).max();
    match (first, last) {
        (Some(first), Some(last)) => format!("{first}..{last}"),
        _ => String::new(),
    }
}

/// Scrapes HTML booking calendars.
pub struct ScrapeSource {
    client: Client,
    config: Arc<CrawlerConfig>,
}

impl ScrapeSource {
    pub fn new(client: Client, config: Arc<CrawlerConfig>) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl CalendarSource for ScrapeSource {
    async fn fetch(
        &self,
        hut: &Hut,
        room: &Room,
        range: DateRange,
        run_log: &RunLog,
    ) -> Result<Vec<Observation>> {
        let context = format!("{}/{}", hut.key, room.name);
        let selectors = CompiledSelectors::compile(&hut.selectors())?;
        let policy = RetryPolicy::from_config(&self.config);
        let mut first = true;

        let walk = walk_pages(
            &context,
            room.url.clone(),
            range,
            self.config.max_pages,
            |location| {
                let is_first = std::mem::replace(&mut first, false);
                let client = &self.client;
                let selectors = &selectors;
                let context = &context;
                let room_name = room.name.as_str();
                async move {
                    let html = retry(policy, context, || fetch_text(client, &location)).await?;
                    let mut page = parse_calendar_page(&html, &location, room_name, selectors);
                    // No day cells at all: broken markup on the first page,
                    // the end of the calendar after that.
                    if page.observations.is_empty() && page.skipped == 0 {
                        if is_first {
                            return Err(AppError::structure(
                                context.as_str(),
                                format!("no day elements on {location}"),
                            ));
                        }
                        page.next = None;
                    }
                    Ok(page)
                }
            },
        )
        .await?;

        if walk.skipped > 0 {
            run_log.warn(format!(
                "{}: skipped {} unreadable day element(s)",
                context, walk.skipped
            ));
        }
        log::debug!(
            "{}: {} observation(s) from {} page(s), ended {:?}",
            context,
            walk.observations.len(),
            walk.pages,
            walk.end
        );
        Ok(walk.observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JULY: &str = r##"
        <html><body>
          <h2 class="calendar-month-label">July   2025</h2>
          <a class="calendar-next" href="?month=2025-08">Next</a>
          <table>
            <tr>
              <td data-date="2025-07-13">13</td>
              <td data-date="2025-07-14" class="day has-availability">
                <span class="slot"><b class="time">06:00</b><i class="left">3 spots left</i></span>
                <span class="slot"><b class="time">07:30</b></span>
              </td>
              <td data-date="2025-07-15" class="day has-availability">15</td>
              <td data-date="not-a-date">??</td>
              <td data-date="" aria-label="Wednesday 2025-07-16">16</td>
            </tr>
          </table>
        </body></html>
    "##;

    fn compiled(with_slots: bool) -> CompiledSelectors {
        let mut selectors = CalendarSelectors::default();
        if with_slots {
            selectors.slot_selector = Some("span.slot".into());
            selectors.slot_time_selector = Some(".time".into());
            selectors.slot_remaining_selector = Some(".left".into());
        }
        CompiledSelectors::compile(&selectors).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_days_and_flags() {
        let page = parse_calendar_page(
            JULY,
            "https://example.com/cal?month=2025-07",
            "Dorm",
            &compiled(false),
        );

        assert_eq!(page.label, "July 2025");
        assert_eq!(page.skipped, 1);
        assert_eq!(
            page.next.as_deref(),
            Some("https://example.com/cal?month=2025-08")
        );

        let read: Vec<_> = page
            .observations
            .iter()
            .map(|o| (o.date, o.available))
            .collect();
        assert_eq!(
            read,
            vec![
                (date("2025-07-13"), false),
                (date("2025-07-14"), true),
                (date("2025-07-15"), true),
                (date("2025-07-16"), false),
            ]
        );
    }

    #[test]
    fn test_parse_slot_detail() {
        let page = parse_calendar_page(JULY, "https://example.com/cal", "Dorm", &compiled(true));

        let slots: Vec<_> = page
            .observations
            .iter()
            .filter(|o| o.date == date("2025-07-14"))
            .map(|o| o.slot.clone().unwrap())
            .collect();
        assert_eq!(
            slots,
            vec![
                SlotDetail {
                    time: "06:00".into(),
                    remaining: Some(3)
                },
                SlotDetail {
                    time: "07:30".into(),
                    remaining: None
                },
            ]
        );
        // An available day without slot markup still counts as available.
        assert!(
            page.observations
                .iter()
                .any(|o| o.date == date("2025-07-15") && o.available && o.slot.is_none())
        );
    }

    #[test]
    fn test_missing_label_and_next() {
        let html = r#"<div data-date="2025-07-01"></div><div data-date="2025-07-02"></div>"#;
        let page = parse_calendar_page(html, "https://example.com/cal", "Dorm", &compiled(false));

        assert_eq!(page.label, "2025-07-01..2025-07-02");
        assert!(page.next.is_none());
        assert!(page.observations.iter().all(|o| !o.available));
    }

    #[test]
    fn test_self_link_is_not_a_next_page() {
        let html = r#"<a class="calendar-next" href="/cal">Next</a><div data-date="2025-07-01"></div>"#;
        let page = parse_calendar_page(html, "https://example.com/cal", "Dorm", &compiled(false));
        assert!(page.next.is_none());
    }

    #[test]
    fn test_invalid_selector_is_rejected() {
        let selectors = CalendarSelectors {
            day_selector: "[[oops".into(),
            ..CalendarSelectors::default()
        };
        assert!(matches!(
            CompiledSelectors::compile(&selectors),
            Err(AppError::Selector { .. })
        ));
    }

    fn calendar_page(label: &str, next: Option<&str>, days: &[(&str, bool)]) -> String {
        let next = next
            .map(|href| format!(r#"<a class="calendar-next" href="{href}">Next</a>"#))
            .unwrap_or_default();
        let cells: String = days
            .iter()
            .map(|(d, open)| {
                let class = if *open { "day has-availability" } else { "day" };
                format!(r#"<td data-date="{d}" class="{class}"></td>"#)
            })
            .collect();
        format!(
            r#"<html><body><h2 class="calendar-month-label">{label}</h2>{next}<table><tr>{cells}</tr></table></body></html>"#
        )
    }

    fn source() -> ScrapeSource {
        let config = CrawlerConfig {
            retry_backoff_ms: 0,
            ..CrawlerConfig::default()
        };
        let client = crate::utils::http::create_client(&config).unwrap();
        ScrapeSource::new(client, Arc::new(config))
    }

    fn hut_at(url: String) -> (Hut, Room) {
        let room = Room {
            name: "Dorm".into(),
            url,
        };
        let hut = Hut {
            key: "setokan".into(),
            name: None,
            source: crate::models::SourceKind::Scrape,
            selectors: None,
            rooms: vec![room.clone()],
        };
        (hut, room)
    }

    #[tokio::test]
    async fn test_fetch_follows_next_link_across_pages() {
        let mut server = mockito::Server::new_async().await;
        let july = server
            .mock("GET", "/cal/july")
            .with_status(200)
            .with_body(calendar_page(
                "July 2025",
                Some("/cal/august"),
                &[("2025-07-29", true), ("2025-07-30", true), ("2025-07-31", false)],
            ))
            .expect(1)
            .create_async()
            .await;
        let august = server
            .mock("GET", "/cal/august")
            .with_status(200)
            .with_body(calendar_page(
                "August 2025",
                Some("/cal/september"),
                &[("2025-08-01", true), ("2025-08-02", false), ("2025-08-03", true)],
            ))
            .expect(1)
            .create_async()
            .await;
        let september = server
            .mock("GET", "/cal/september")
            .expect(0)
            .create_async()
            .await;

        let (hut, room) = hut_at(format!("{}/cal/july", server.url()));
        let range = DateRange::new(date("2025-07-30"), date("2025-08-03"));
        let observations = source()
            .fetch(&hut, &room, range, &RunLog::new())
            .await
            .unwrap();

        let read: Vec<_> = observations.iter().map(|o| (o.date, o.available)).collect();
        assert_eq!(
            read,
            vec![
                (date("2025-07-30"), true),
                (date("2025-07-31"), false),
                (date("2025-08-01"), true),
                (date("2025-08-02"), false),
            ]
        );
        july.assert_async().await;
        august.assert_async().await;
        september.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_rejects_first_page_without_day_cells() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/cal")
            .with_status(200)
            .with_body("<html><body><p>Booking opens soon</p></body></html>")
            .create_async()
            .await;

        let (hut, room) = hut_at(format!("{}/cal", server.url()));
        let range = DateRange::new(date("2025-07-14"), date("2025-07-15"));
        let result = source().fetch(&hut, &room, range, &RunLog::new()).await;

        assert!(matches!(result, Err(AppError::Structure { .. })));
    }

    #[tokio::test]
    async fn test_fetch_stops_at_page_without_day_cells() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/cal/july")
            .with_status(200)
            .with_body(calendar_page(
                "July 2025",
                Some("/cal/august"),
                &[("2025-07-30", true), ("2025-07-31", true)],
            ))
            .create_async()
            .await;
        server
            .mock("GET", "/cal/august")
            .with_status(200)
            .with_body(calendar_page("August 2025", Some("/cal/september"), &[]))
            .create_async()
            .await;
        let september = server
            .mock("GET", "/cal/september")
            .expect(0)
            .create_async()
            .await;

        let (hut, room) = hut_at(format!("{}/cal/july", server.url()));
        let range = DateRange::new(date("2025-07-30"), date("2025-08-05"));
        let observations = source()
            .fetch(&hut, &room, range, &RunLog::new())
            .await
            .unwrap();

        assert_eq!(observations.len(), 2);
        september.assert_async().await;
    }

    #[test]
    fn test_first_number() {
        assert_eq!(first_number("3 spots left"), Some(3));
        assert_eq!(first_number("Remaining: 12"), Some(12));
        assert_eq!(first_number("sold out"), None);
    }
}
