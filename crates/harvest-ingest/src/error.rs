//! Error types for harvesting and index synchronization
//!
//! Errors are split by blast radius:
//!
//! - [`HarvestError`] aborts whatever owns it (a fetcher, a sync pass).
//! - [`RecordError`] is confined to a single record; the sync engine logs it
//!   and moves on to the next change.
//! - [`IndexError`] is raised by index clients and classified by the engine:
//!   client-class rejections are per-record, everything else is fatal.

use thiserror::Error;

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Pass-level and fetcher-level failures
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error(
        "Number of documents fetched ({fetched}) doesn't match total reported by server ({reported})"
    )]
    Consistency { fetched: u64, reported: u64 },

    #[error("Change feed error: {0}")]
    ChangeFeed(String),

    #[error("Index unavailable: {0}")]
    IndexFatal(String),

    #[error("Checkpoint storage error: {0}")]
    CheckpointBackend(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] harvest_common::CommonError),
}

impl HarvestError {
    pub fn source_unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn checkpoint(msg: impl ToString) -> Self {
        Self::CheckpointBackend(msg.to_string())
    }
}

impl From<quick_xml::Error> for HarvestError {
    fn from(err: quick_xml::Error) -> Self {
        HarvestError::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for HarvestError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        HarvestError::Xml(err.to_string())
    }
}

/// Failures confined to one source record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// The record fails required-field validation
    #[error("OMITTED: Doc:{id} {reason}")]
    Rejected { id: String, reason: String },

    /// A collection reference predates repository links in the registry
    #[error("Old collection (no repository) for doc:{id}")]
    UnsupportedCollection { id: String },

    /// A field holds a value shape the mapping cannot express
    #[error("Unexpected value for field '{field}' in doc:{id}: {reason}")]
    Transform {
        id: String,
        field: String,
        reason: String,
    },
}

impl RecordError {
    pub fn rejected(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn transform(id: impl Into<String>, field: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transform {
            id: id.into(),
            field: field.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failures reported by an index client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// The index refused the request as malformed (HTTP 4xx)
    #[error("Index rejected request (status {status}): {message}")]
    Client { status: u16, message: String },

    /// The index is unreachable or failed internally
    #[error("Index failure: {0}")]
    Fatal(String),
}

impl IndexError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, IndexError::Client { .. })
    }
}

impl From<IndexError> for HarvestError {
    fn from(err: IndexError) -> Self {
        HarvestError::IndexFatal(err.to_string())
    }
}
