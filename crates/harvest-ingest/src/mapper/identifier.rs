//! Index identifier resolution
//!
//! Resolution order, first hit wins:
//!
//! 1. an ARK found in `sourceResource.identifier`
//! 2. the upstream UUID for passthrough (`NUX`) collections
//! 3. an ARK built from `originalRecord.id` for campuses with known ARK prefixes
//! 4. the SHA-256 of the store `_id`

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use super::{items, object_field, record_key, ORIGINAL_RECORD, SOURCE_RESOURCE};
use crate::error::RecordError;
use crate::record::SourceRecord;
use harvest_common::checksum::sha256_hex;

/// Harvest type of collections whose records keep their upstream UUID
pub const PASSTHROUGH_HARVEST_TYPE: &str = "NUX";

/// Registry campus whose records carry bare ARK fragments
pub const ARK_FRAGMENT_CAMPUS: &str = "https://registry.cdlib.org/api/v1/campus/6/";

/// Name-assigning authority prefix for [`ARK_FRAGMENT_CAMPUS`]
pub const ARK_FRAGMENT_PREFIX: &str = "ark:/20775/";

#[allow(clippy::expect_used)]
static ARK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ark:/\d{5}/[^/|\s]*").expect("valid ARK pattern"));

/// Resolve the index identifier of a record
pub fn resolve_id(
    record: &SourceRecord,
    collections: &[&Map<String, Value>],
) -> Result<String, RecordError> {
    if let Some(ark) = ark_in_identifiers(record) {
        return Ok(ark);
    }
    if let Some(uid) = passthrough_uid(record, collections) {
        return Ok(uid);
    }
    if let Some(ark) = campus_ark(record, collections) {
        return Ok(ark);
    }

    match record.get("_id").and_then(Value::as_str) {
        Some(store_id) if !store_id.is_empty() => Ok(sha256_hex(store_id)),
        _ => Err(RecordError::rejected(record_key(record), "has no _id.")),
    }
}

/// First ARK found in any identifier
pub fn find_ark(text: &str) -> Option<&str> {
    ARK_PATTERN.find(text).map(|m| m.as_str())
}

fn ark_in_identifiers(record: &SourceRecord) -> Option<String> {
    let identifiers = object_field(record, SOURCE_RESOURCE)?.get("identifier")?;
    items(identifiers)
        .into_iter()
        .filter_map(Value::as_str)
        .find_map(find_ark)
        .map(str::to_string)
}

fn passthrough_uid(record: &SourceRecord, collections: &[&Map<String, Value>]) -> Option<String> {
    let harvest_type = collections.first()?.get("harvest_type")?.as_str()?;
    if harvest_type != PASSTHROUGH_HARVEST_TYPE {
        return None;
    }
    non_empty(object_field(record, ORIGINAL_RECORD)?.get("uid")?)
}

fn campus_ark(record: &SourceRecord, collections: &[&Map<String, Value>]) -> Option<String> {
    let campus = collections.first()?.get("campus")?;
    let campus_id = items(campus).first().copied()?.get("@id")?.as_str()?;
    if campus_id != ARK_FRAGMENT_CAMPUS {
        return None;
    }
    let fragment = non_empty(object_field(record, ORIGINAL_RECORD)?.get("id")?)?;
    Some(format!("{ARK_FRAGMENT_PREFIX}{fragment}"))
}

fn non_empty(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mapper::collections;
    use crate::mapper::tests::sample_record;
    use serde_json::json;

    fn resolve(record: &SourceRecord) -> Result<String, RecordError> {
        let original = record["originalRecord"].as_object().unwrap();
        let found = collections(original).unwrap();
        resolve_id(record, &found)
    }

    fn without_ark(mut record: SourceRecord) -> SourceRecord {
        record["sourceResource"]["identifier"] = json!(["local-17"]);
        record
    }

    #[test]
    fn test_find_ark() {
        assert_eq!(
            find_ark("http://ark.cdlib.org/ark:/13030/kt7580382j/?brand=oac"),
            Some("ark:/13030/kt7580382j")
        );
        assert_eq!(find_ark("ark:/1303/short"), None);
    }

    #[test]
    fn test_ark_in_identifiers_wins() {
        let mut record = sample_record();
        record["originalRecord"]["collection"][0]["harvest_type"] = json!("NUX");
        record["originalRecord"]["uid"] = json!("uuid-1");
        assert_eq!(resolve(&record).unwrap(), "ark:/13030/kt7580382j");
    }

    #[test]
    fn test_passthrough_uid() {
        let mut record = without_ark(sample_record());
        record["originalRecord"]["collection"][0]["harvest_type"] = json!("NUX");
        record["originalRecord"]["uid"] = json!("8a5f3b2c-uuid");
        assert_eq!(resolve(&record).unwrap(), "8a5f3b2c-uuid");
    }

    #[test]
    fn test_campus_ark_fragment() {
        let mut record = without_ark(sample_record());
        record["originalRecord"]["collection"][0]["campus"] =
            json!([{"@id": ARK_FRAGMENT_CAMPUS, "name": "UC San Diego"}]);
        record["originalRecord"]["id"] = json!("bb0171207r");
        assert_eq!(resolve(&record).unwrap(), "ark:/20775/bb0171207r");
    }

    #[test]
    fn test_hash_fallback() {
        let record = without_ark(sample_record());
        assert_eq!(
            resolve(&record).unwrap(),
            sha256_hex("26094--http://ark.cdlib.org/ark:/13030/kt7580382j")
        );
    }

    #[test]
    fn test_missing_store_id_rejected() {
        let mut record = without_ark(sample_record());
        record.remove("_id");
        assert!(matches!(resolve(&record), Err(RecordError::Rejected { .. })));
    }
}
