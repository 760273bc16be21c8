//! Field mapping from stored harvest records to index documents
//!
//! A stored record has three blocks the index cares about:
//!
//! - top-level fields (`id`, `object`, `isShownAt`)
//! - `sourceResource`: the normalized descriptive metadata
//! - `originalRecord`: what the upstream source delivered, including the
//!   registry collections the record belongs to
//!
//! [`prepare_record`] is the gate run before mapping (required fields plus
//! title normalization). [`map_record`] is pure: the same record always maps
//! to the same document.

pub mod decade;
pub mod identifier;
pub mod registry;
pub mod sort_title;
pub mod tables;
pub mod validation;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::RecordError;
use crate::record::{FieldValue, IndexDocument, SourceRecord};

pub use decade::facet_decades;
pub use identifier::resolve_id;
pub use sort_title::{normalize_sort_title, SORT_TITLE_LAST};
pub use validation::{fill_in_title, validate_required_fields};

pub const SOURCE_RESOURCE: &str = "sourceResource";
pub const ORIGINAL_RECORD: &str = "originalRecord";
pub const COLLECTION: &str = "collection";

/// Store identifier of a record, for logging and the content-hash fallback
pub fn record_key(record: &SourceRecord) -> &str {
    record
        .get("_id")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
}

/// Validate and normalize a record ahead of [`map_record`]
pub fn prepare_record(mut record: SourceRecord) -> Result<SourceRecord, RecordError> {
    validate_required_fields(&record)?;
    fill_in_title(&mut record);
    Ok(record)
}

/// Map a prepared record into an index document
pub fn map_record(record: &SourceRecord) -> Result<IndexDocument, RecordError> {
    let key = record_key(record);
    let resource = object_field(record, SOURCE_RESOURCE)
        .ok_or_else(|| RecordError::rejected(key, "has no sourceResource."))?;
    let original = object_field(record, ORIGINAL_RECORD)
        .ok_or_else(|| RecordError::rejected(key, "has no originalRecord."))?;
    let collections = collections(original)
        .ok_or_else(|| RecordError::rejected(key, "has no registry collection."))?;

    let id = resolve_id(record, &collections)?;
    let context = tables::MapContext { id: &id };

    let mut doc = IndexDocument::new();
    tables::apply(&mut doc, record, tables::TOP_LEVEL, &context, key)?;
    for (field, value) in registry::map_registry_data(&collections, key)? {
        doc.insert(field, value);
    }
    tables::apply(&mut doc, resource, tables::SOURCE_RESOURCE, &context, key)?;
    tables::apply(&mut doc, original, tables::ORIGINAL_RECORD, &context, key)?;

    doc.insert("sort_title", FieldValue::text(sort_title::sort_title_for(resource, original)));

    let mut decades = std::collections::BTreeSet::new();
    if let Some(date) = resource.get("date") {
        for shown in decade::display_dates(date) {
            let found = facet_decades(&shown);
            if found.is_empty() {
                debug!(id = %key, date = %shown, "No decade found in display date");
            }
            decades.extend(found);
        }
    }
    doc.insert("facet_decade", FieldValue::texts(decades));

    doc.insert("id", FieldValue::text(id));
    Ok(doc)
}

/// Validate, normalize and map in one step
pub fn transform(record: SourceRecord) -> Result<IndexDocument, RecordError> {
    let prepared = prepare_record(record)?;
    map_record(&prepared)
}

pub(crate) fn object_field<'a>(record: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    record.get(key).and_then(Value::as_object)
}

/// Registry collections of an `originalRecord` block, in declared order
pub(crate) fn collections(original: &Map<String, Value>) -> Option<Vec<&Map<String, Value>>> {
    let found: Vec<_> = match original.get(COLLECTION)? {
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        Value::Object(single) => vec![single],
        _ => return None,
    };
    (!found.is_empty()).then_some(found)
}

/// Values of a field that may hold one item or a list of items
pub(crate) fn items(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}
