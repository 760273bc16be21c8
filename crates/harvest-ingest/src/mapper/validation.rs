//! Required-field gate and pre-mapping normalization

use serde_json::Value;

use super::{collections, items, object_field, record_key, ORIGINAL_RECORD, SOURCE_RESOURCE};
use crate::error::RecordError;
use crate::mapper::identifier::PASSTHROUGH_HARVEST_TYPE;
use crate::record::{SourceRecord, TITLE_UNKNOWN};

/// Reject records the index cannot represent.
///
/// A record must carry a `sourceResource` block with a `title` key. Image
/// records must either reference a harvested image (`object`) or come from
/// the passthrough integration, which serves its own media.
pub fn validate_required_fields(record: &SourceRecord) -> Result<(), RecordError> {
    let key = record_key(record);
    let resource = object_field(record, SOURCE_RESOURCE)
        .ok_or_else(|| RecordError::rejected(key, "has no sourceResource."))?;

    if !resource.contains_key("title") {
        return Err(RecordError::rejected(key, "has no title."));
    }

    if is_image(resource.get("type")) && !record.contains_key("object") {
        let harvest_type = object_field(record, ORIGINAL_RECORD)
            .and_then(collections)
            .and_then(|found| found.first().copied())
            .and_then(|collection| collection.get("harvest_type"))
            .and_then(Value::as_str);

        if harvest_type != Some(PASSTHROUGH_HARVEST_TYPE) {
            return Err(RecordError::rejected(
                key,
                "is image type with no harvested image.",
            ));
        }
    }

    Ok(())
}

fn is_image(type_field: Option<&Value>) -> bool {
    type_field
        .map(|value| {
            items(value)
                .into_iter()
                .filter_map(Value::as_str)
                .any(|t| t.eq_ignore_ascii_case("image"))
        })
        .unwrap_or(false)
}

/// Replace a missing or blank title with `["Title unknown"]`
pub fn fill_in_title(record: &mut SourceRecord) {
    let Some(Value::Object(resource)) = record.get_mut(SOURCE_RESOURCE) else {
        return;
    };

    let has_title = match resource.get("title") {
        Some(Value::String(title)) => !title.trim().is_empty(),
        Some(Value::Array(titles)) => titles
            .iter()
            .any(|t| t.as_str().map(|s| !s.trim().is_empty()).unwrap_or(false)),
        Some(Value::Null) | None => false,
        Some(_) => true,
    };

    if !has_title {
        resource.insert(
            "title".to_string(),
            Value::Array(vec![Value::String(TITLE_UNKNOWN.to_string())]),
        );
    }
}
