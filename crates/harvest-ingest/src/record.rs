//! Source records and index documents

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// An arbitrarily nested document as delivered by an upstream source.
///
/// There is no fixed schema; mapping code checks for key presence.
pub type SourceRecord = Map<String, Value>;

/// Title written into records that arrive without one
pub const TITLE_UNKNOWN: &str = "Title unknown";

/// A scalar value the index accepts
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

/// A flat index field: one scalar or a list of scalars
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

/// Why a JSON value cannot become a [`FieldValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeError {
    NestedObject,
    NestedList,
}

impl std::fmt::Display for ShapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShapeError::NestedObject => write!(f, "nested objects cannot be indexed"),
            ShapeError::NestedList => write!(f, "nested lists cannot be indexed"),
        }
    }
}

impl Scalar {
    fn from_json(value: &Value) -> Result<Option<Self>, ShapeError> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(Scalar::Text(s.clone()))),
            Value::Number(n) => Ok(Some(Scalar::Number(n.clone()))),
            Value::Bool(b) => Ok(Some(Scalar::Bool(*b))),
            Value::Array(_) => Err(ShapeError::NestedList),
            Value::Object(_) => Err(ShapeError::NestedObject),
        }
    }
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Scalar(Scalar::Text(value.into()))
    }

    pub fn texts<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldValue::List(values.into_iter().map(|v| Scalar::Text(v.into())).collect())
    }

    /// Convert a JSON value, dropping nulls.
    ///
    /// Returns `Ok(None)` for `null`; nulls inside lists are skipped.
    pub fn from_json(value: &Value) -> Result<Option<Self>, ShapeError> {
        match value {
            Value::Array(items) => {
                let mut scalars = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(scalar) = Scalar::from_json(item)? {
                        scalars.push(scalar);
                    }
                }
                Ok(Some(FieldValue::List(scalars)))
            },
            other => Ok(Scalar::from_json(other)?.map(FieldValue::Scalar)),
        }
    }

    /// The first text value, if any
    pub fn first_text(&self) -> Option<&str> {
        let scalar = match self {
            FieldValue::Scalar(s) => Some(s),
            FieldValue::List(items) => items.first(),
        };
        match scalar {
            Some(Scalar::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }
}

/// A flat document destined for the search index.
///
/// Fields are kept in a sorted map so serialization is byte-identical for
/// identical inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct IndexDocument {
    fields: BTreeMap<String, FieldValue>,
}

impl IndexDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn id(&self) -> Option<&str> {
        self.get("id").and_then(FieldValue::first_text)
    }

    pub fn sort_title(&self) -> Option<&str> {
        self.get("sort_title").and_then(FieldValue::first_text)
    }

    /// Decade labels, sorted
    pub fn facet_decades(&self) -> BTreeSet<String> {
        match self.get("facet_decade") {
            Some(FieldValue::List(items)) => items
                .iter()
                .filter_map(|s| match s {
                    Scalar::Text(t) => Some(t.clone()),
                    _ => None,
                })
                .collect(),
            Some(FieldValue::Scalar(Scalar::Text(t))) => BTreeSet::from([t.clone()]),
            _ => BTreeSet::new(),
        }
    }
}
