//! Decade facets derived from display dates

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// Earliest year accepted as a date (four-digit runs below are ignored)
pub const MIN_YEAR: u32 = 1000;
/// Latest year accepted as a date
pub const MAX_YEAR: u32 = 2099;

/// One entry of a `date` field
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DateEntry {
    Text(String),
    Structured {
        #[serde(rename = "displayDate")]
        display_date: Option<String>,
    },
    Other(Value),
}

/// A `date` field is either one entry or a list of entries
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DateField {
    Many(Vec<DateEntry>),
    One(DateEntry),
}

impl DateEntry {
    fn into_display(self) -> Option<String> {
        match self {
            DateEntry::Text(text) => Some(text),
            DateEntry::Structured { display_date } => display_date,
            DateEntry::Other(value) => {
                debug!(value = %value, "Ignoring date entry without display text");
                None
            },
        }
    }
}

/// Display strings of a `date` field, in declared order
pub fn display_dates(value: &Value) -> Vec<String> {
    let entries = match DateField::deserialize(value) {
        Ok(DateField::Many(entries)) => entries,
        Ok(DateField::One(entry)) => vec![entry],
        Err(e) => {
            debug!(error = %e, "Unreadable date field");
            Vec::new()
        },
    };
    entries
        .into_iter()
        .filter_map(DateEntry::into_display)
        .collect()
}

/// Decade labels spanned by a display date.
///
/// Four-digit years inside `MIN_YEAR..=MAX_YEAR` are collected from the text;
/// one year yields its decade, several years yield every decade from the
/// earliest to the latest. Text without a usable year yields an empty set.
///
/// ```rust
/// use harvest_ingest::mapper::facet_decades;
///
/// assert_eq!(facet_decades("1920s").into_iter().collect::<Vec<_>>(), vec!["1920s"]);
/// assert_eq!(facet_decades("circa 1923").into_iter().collect::<Vec<_>>(), vec!["1920s"]);
/// assert!(facet_decades("undated").is_empty());
/// ```
pub fn facet_decades(display_date: &str) -> BTreeSet<String> {
    let years = years_in(display_date);
    let (Some(first), Some(last)) = (years.iter().min(), years.iter().max()) else {
        return BTreeSet::new();
    };

    (first / 10..=last / 10)
        .map(|decade| format!("{}0s", decade))
        .collect()
}

fn years_in(text: &str) -> Vec<u32> {
    let mut years = Vec::new();
    let mut run = String::new();

    for c in text.chars().chain(std::iter::once(' ')) {
        if c.is_ascii_digit() {
            run.push(c);
            continue;
        }
        if run.len() == 4 {
            if let Ok(year) = run.parse::<u32>() {
                if (MIN_YEAR..=MAX_YEAR).contains(&year) {
                    years.push(year);
                }
            }
        }
        run.clear();
    }

    years
}
