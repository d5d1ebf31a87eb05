//! Lenient date parsing for source tables.
//!
//! Source files mix several layouts. Day-first ordering wins whenever the
//! text is ambiguous, so `01-02-2025` is the 1st of February.

use crate::errors::DateParseError;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

/// Date-only layouts with a four-digit year, tried in order.
const FULL_YEAR_LAYOUTS: &[&str] = &[
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%b-%Y",
    "%d %B %Y",
];

/// Date-only layouts with a two-digit year.
const SHORT_YEAR_LAYOUTS: &[&str] = &["%d-%m-%y", "%d/%m/%y", "%d.%m.%y"];

/// Time suffixes accepted after any date layout.
const TIME_SUFFIXES: &[&str] = &[" %H:%M:%S", " %H:%M", "T%H:%M:%S", "T%H:%M"];

/// Parse a date cell, trying every accepted layout.
pub fn parse_date(input: &str) -> Result<NaiveDate, DateParseError> {
    let text = input.trim();
    if text.is_empty() {
        return Err(DateParseError {
            input: input.to_string(),
        });
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.date_naive());
    }

    for layout in FULL_YEAR_LAYOUTS {
        if let Some(date) = parse_with(text, layout).filter(|d| d.year() >= 1000) {
            return Ok(date);
        }
    }

    for layout in SHORT_YEAR_LAYOUTS {
        if let Some(date) = parse_with(text, layout) {
            return Ok(date);
        }
    }

    Err(DateParseError {
        input: input.to_string(),
    })
}

/// Try one date layout, alone or followed by a time component.
fn parse_with(text: &str, layout: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(text, layout) {
        return Some(date);
    }

    TIME_SUFFIXES.iter().find_map(|suffix| {
        let full = format!("{layout}{suffix}");
        NaiveDateTime::parse_from_str(text, &full)
            .ok()
            .map(|dt| dt.date())
    })
}
