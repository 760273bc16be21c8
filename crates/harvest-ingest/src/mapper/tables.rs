//! Static field-mapping tables
//!
//! Each table lists source keys in application order. A rule runs only when
//! its source key is present; a rule returning `None` contributes nothing.
//! When two rules write the same target the later one wins (`spatial` is
//! listed after `coverage` for that reason).

use serde_json::{Map, Value};

use super::items;
use crate::error::RecordError;
use crate::mapper::decade::display_dates;
use crate::record::{FieldValue, IndexDocument, ShapeError};

static NULL: Value = Value::Null;

/// Values shared by every rule while mapping one record
pub struct MapContext<'a> {
    /// The resolved index identifier
    pub id: &'a str,
}

pub type Transform = fn(&Value, &MapContext<'_>) -> Result<Option<FieldValue>, ShapeError>;

/// One `source key -> index field` rule
pub struct FieldMapping {
    pub source: &'static str,
    pub target: &'static str,
    pub transform: Transform,
}

const fn rule(source: &'static str, target: &'static str, transform: Transform) -> FieldMapping {
    FieldMapping {
        source,
        target,
        transform,
    }
}

pub static TOP_LEVEL: &[FieldMapping] = &[
    rule("id", "harvest_id_s", resolved_id),
    rule("object", "reference_image_md5", as_is),
    rule("isShownAt", "url_item", as_is),
];

pub static SOURCE_RESOURCE: &[FieldMapping] = &[
    rule("alternativeTitle", "alternative_title", as_is),
    rule("contributor", "contributor", as_is),
    rule("coverage", "coverage", as_is),
    rule("spatial", "coverage", text_or_value),
    rule("creator", "creator", as_is),
    rule("date", "date", dates),
    rule("description", "description", as_list),
    rule("extent", "extent", as_is),
    rule("format", "format", as_is),
    rule("genre", "genre", as_is),
    rule("identifier", "identifier", as_is),
    rule("language", "language", languages),
    rule("publisher", "publisher", as_is),
    rule("relation", "relation", as_is),
    rule("rights", "rights", as_is),
    rule("subject", "subject", subject_names),
    rule("temporalCoverage", "temporal", as_is),
    rule("title", "title", as_is),
    rule("type", "type", as_is),
];

pub static ORIGINAL_RECORD: &[FieldMapping] = &[
    rule("location", "location", as_is),
    rule("provenance", "provenance", as_is),
    rule("dateCopyrighted", "rights_date", as_is),
    rule("rightsHolder", "rights_holder", as_is),
    rule("rightsNote", "rights_note", as_is),
    rule("source", "source", as_is),
    rule("structmap_text", "structmap_text", as_is),
    rule("structmap_url", "structmap_url", as_is),
    rule("transcription", "transcription", as_is),
];

/// Apply every rule whose source key is present in `block`
pub fn apply(
    doc: &mut IndexDocument,
    block: &Map<String, Value>,
    table: &[FieldMapping],
    context: &MapContext<'_>,
    record_key: &str,
) -> Result<(), RecordError> {
    for mapping in table {
        let Some(value) = block.get(mapping.source) else {
            continue;
        };
        match (mapping.transform)(value, context) {
            Ok(Some(mapped)) => doc.insert(mapping.target, mapped),
            Ok(None) => {},
            Err(e) => return Err(RecordError::transform(record_key, mapping.source, e)),
        }
    }
    Ok(())
}

fn as_is(value: &Value, _: &MapContext<'_>) -> Result<Option<FieldValue>, ShapeError> {
    FieldValue::from_json(value)
}

fn resolved_id(_: &Value, context: &MapContext<'_>) -> Result<Option<FieldValue>, ShapeError> {
    Ok(Some(FieldValue::text(context.id)))
}

fn as_list(value: &Value, _: &MapContext<'_>) -> Result<Option<FieldValue>, ShapeError> {
    collect_scalars(items(value).into_iter().map(Ok))
}

fn dates(value: &Value, _: &MapContext<'_>) -> Result<Option<FieldValue>, ShapeError> {
    Ok(Some(FieldValue::texts(display_dates(value))))
}

/// Place-like entries: `{"text": ...}` objects are flattened to their text
fn text_or_value(value: &Value, _: &MapContext<'_>) -> Result<Option<FieldValue>, ShapeError> {
    collect_scalars(items(value).into_iter().map(|item| match item {
        Value::Object(obj) => obj.get("text").ok_or(ShapeError::NestedObject),
        other => Ok(other),
    }))
}

/// Languages prefer the ISO 639-3 code, then the display name
fn languages(value: &Value, _: &MapContext<'_>) -> Result<Option<FieldValue>, ShapeError> {
    collect_scalars(items(value).into_iter().map(|item| match item {
        Value::Object(obj) => Ok(obj
            .get("iso639_3")
            .or_else(|| obj.get("name"))
            .unwrap_or(&NULL)),
        other => Ok(other),
    }))
}

fn subject_names(value: &Value, _: &MapContext<'_>) -> Result<Option<FieldValue>, ShapeError> {
    collect_scalars(items(value).into_iter().map(|item| match item {
        Value::Object(obj) => obj.get("name").ok_or(ShapeError::NestedObject),
        other => Ok(other),
    }))
}

fn collect_scalars<'a, I>(values: I) -> Result<Option<FieldValue>, ShapeError>
where
    I: Iterator<Item = Result<&'a Value, ShapeError>>,
{
    let mut scalars = Vec::new();
    for value in values {
        match FieldValue::from_json(value?)? {
            Some(FieldValue::Scalar(scalar)) => scalars.push(scalar),
            Some(FieldValue::List(_)) => return Err(ShapeError::NestedList),
            None => {},
        }
    }
    Ok(Some(FieldValue::List(scalars)))
}
