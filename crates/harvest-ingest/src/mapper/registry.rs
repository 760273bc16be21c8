//! Registry collection, repository and campus fields

use serde_json::{Map, Value};

use super::items;
use crate::error::RecordError;
use crate::record::FieldValue;

type Entity<'a> = &'a Map<String, Value>;

/// Append a trailing slash when missing
pub fn add_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

#[derive(Default)]
struct RegistryFields {
    collection_url: Vec<String>,
    collection_name: Vec<String>,
    collection_data: Vec<String>,
    repository_url: Vec<String>,
    repository_name: Vec<String>,
    repository_data: Vec<String>,
    campus_url: Vec<String>,
    campus_name: Vec<String>,
    campus_data: Vec<String>,
    has_campus: bool,
}

/// Flatten registry collections into index fields.
///
/// Every collection must reference its repositories; records still pointing
/// at pre-repository collections are reported as unsupported. Campus fields
/// are emitted only when at least one collection names a campus.
pub fn map_registry_data(
    collections: &[Entity<'_>],
    record_key: &str,
) -> Result<Vec<(&'static str, FieldValue)>, RecordError> {
    let mut fields = RegistryFields::default();

    for collection in collections {
        let (url, name) = url_and_name(collection, "collection", record_key)?;
        fields.collection_data.push(format!("{url}::{name}"));
        fields.collection_url.push(url);
        fields.collection_name.push(name);

        if let Some(campuses) = collection.get("campus") {
            fields.has_campus = true;
            for campus in entities(campuses) {
                let (url, name) = url_and_name(campus, "campus", record_key)?;
                fields.campus_data.push(format!("{url}::{name}"));
                fields.campus_url.push(url);
                fields.campus_name.push(name);
            }
        }

        let repositories = collection
            .get("repository")
            .ok_or_else(|| RecordError::UnsupportedCollection {
                id: record_key.to_string(),
            })?;
        for repository in entities(repositories) {
            let (url, name) = url_and_name(repository, "repository", record_key)?;
            let campus_name = repository
                .get("campus")
                .map(entities)
                .and_then(|campuses| campuses.first().copied())
                .and_then(|campus| campus.get("name"))
                .and_then(Value::as_str);
            let data = match campus_name {
                Some(campus) => format!("{url}::{name}::{campus}"),
                None => format!("{url}::{name}"),
            };
            fields.repository_data.push(data);
            fields.repository_url.push(url);
            fields.repository_name.push(name);
        }
    }

    let mut mapped = vec![
        ("collection_url", FieldValue::texts(fields.collection_url)),
        ("collection_name", FieldValue::texts(fields.collection_name)),
        ("collection_data", FieldValue::texts(fields.collection_data)),
        ("repository_url", FieldValue::texts(fields.repository_url)),
        ("repository_name", FieldValue::texts(fields.repository_name)),
        ("repository_data", FieldValue::texts(fields.repository_data)),
    ];
    if fields.has_campus {
        mapped.push(("campus_url", FieldValue::texts(fields.campus_url)));
        mapped.push(("campus_name", FieldValue::texts(fields.campus_name)));
        mapped.push(("campus_data", FieldValue::texts(fields.campus_data)));
    }
    Ok(mapped)
}

fn entities(value: &Value) -> Vec<Entity<'_>> {
    items(value).into_iter().filter_map(Value::as_object).collect()
}

fn url_and_name(
    entity: Entity<'_>,
    kind: &str,
    record_key: &str,
) -> Result<(String, String), RecordError> {
    let url = entity
        .get("@id")
        .and_then(Value::as_str)
        .ok_or_else(|| RecordError::transform(record_key, kind, "registry entry has no @id"))?;
    let name = entity
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| RecordError::transform(record_key, kind, "registry entry has no name"))?;
    Ok((add_slash(url), name.to_string()))
}
