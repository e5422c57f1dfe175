// src/models/selectors.rs

//! CSS selectors for scraping a booking calendar page.

use serde::{Deserialize, Serialize};

/// CSS selectors for scraping a booking calendar page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSelectors {
    /// Selector for each day cell in the calendar grid
    #[serde(default = "default_day_selector")]
    pub day_selector: String,

    /// Attribute on the day cell holding its ISO date
    #[serde(default = "default_date_attr")]
    pub date_attr: String,

    /// Class marking a day that has availability
    #[serde(default = "default_available_class")]
    pub available_class: String,

    /// Selector for the page label (usually the month heading)
    #[serde(default = "default_label_selector")]
    pub label_selector: String,

    /// Selector for the "next month" link
    #[serde(default = "default_next_selector")]
    pub next_selector: String,

    /// Attribute on the next link holding its target
    #[serde(default = "default_next_attr")]
    pub next_attr: String,

    /// Selector for time slots inside an available day
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_selector: Option<String>,

    /// Selector for the slot time inside a slot element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_time_selector: Option<String>,

    /// Selector for the remaining-capacity text inside a slot element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_remaining_selector: Option<String>,
}

fn default_day_selector() -> String {
    "[data-date]".to_string()
}

fn default_date_attr() -> String {
    "data-date".to_string()
}

fn default_available_class() -> String {
    "has-availability".to_string()
}

fn default_label_selector() -> String {
    ".calendar-month-label".to_string()
}

fn default_next_selector() -> String {
    "a.calendar-next".to_string()
}

fn default_next_attr() -> String {
    "href".to_string()
}

impl Default for CalendarSelectors {
    fn default() -> Self {
        Self {
            day_selector: default_day_selector(),
            date_attr: default_date_attr(),
            available_class: default_available_class(),
            label_selector: default_label_selector(),
            next_selector: default_next_selector(),
            next_attr: default_next_attr(),
            slot_selector: None,
            slot_time_selector: None,
            slot_remaining_selector: None,
        }
    }
}

impl CalendarSelectors {
    /// All selector strings, for up-front validation.
    pub fn all(&self) -> Vec<&str> {
        let mut all = vec![
            self.day_selector.as_str(),
            self.label_selector.as_str(),
            self.next_selector.as_str(),
        ];
        all.extend(
            [
                &self.slot_selector,
                &self.slot_time_selector,
                &self.slot_remaining_selector,
            ]
            .into_iter()
            .flatten()
            .map(String::as_str),
        );
        all
    }
}
