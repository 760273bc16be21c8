//! Sort-title normalization

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::record::TITLE_UNKNOWN;

/// Sort key for untitled records; `~` sorts after letters in ascending order
pub const SORT_TITLE_LAST: &str = "~title unknown";

const LEADING_ARTICLES: [&str; 3] = ["the", "a", "an"];

/// Normalize a title into its sort key.
///
/// Lowercases, keeps ASCII letters, digits and whitespace, drops one leading
/// article and collapses whitespace. An empty result, or the placeholder
/// title, becomes [`SORT_TITLE_LAST`].
pub fn normalize_sort_title(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();

    let mut words = cleaned.split_whitespace().peekable();
    if words.peek().is_some_and(|w| LEADING_ARTICLES.contains(w)) {
        words.next();
    }
    let normalized = words.collect::<Vec<_>>().join(" ");

    if normalized.is_empty() || normalized == "title unknown" {
        SORT_TITLE_LAST.to_string()
    } else {
        normalized
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SortTitleEntry {
    Text(String),
    Structured { text: Option<String> },
    Other(Value),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SortTitleField {
    Many(Vec<SortTitleEntry>),
    One(SortTitleEntry),
}

/// Sort key of a record.
///
/// An explicit `originalRecord["sort-title"]` wins over the first title.
pub fn sort_title_for(resource: &Map<String, Value>, original: &Map<String, Value>) -> String {
    let explicit = original
        .get("sort-title")
        .and_then(|value| SortTitleField::deserialize(value).ok())
        .and_then(|field| {
            let first = match field {
                SortTitleField::Many(entries) => entries.into_iter().next(),
                SortTitleField::One(entry) => Some(entry),
            };
            match first? {
                SortTitleEntry::Text(text) => Some(text),
                SortTitleEntry::Structured { text } => text,
                SortTitleEntry::Other(_) => None,
            }
        })
        .filter(|text| !text.trim().is_empty());

    let title = explicit.unwrap_or_else(|| first_title(resource));
    normalize_sort_title(&title)
}

fn first_title(resource: &Map<String, Value>) -> String {
    let first = match resource.get("title") {
        Some(Value::Array(titles)) => titles.iter().find_map(Value::as_str),
        Some(Value::String(title)) => Some(title.as_str()),
        _ => None,
    };
    first.unwrap_or(TITLE_UNKNOWN).to_string()
}
