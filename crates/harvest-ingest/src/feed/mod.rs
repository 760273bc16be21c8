//! Change feeds
//!
//! A change feed lists the latest state of every record changed since a
//! position. Intermediate states between two reads are never observed.

pub mod couchdb;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;
use crate::record::SourceRecord;
use harvest_common::Position;

pub use couchdb::CouchChangeFeed;

/// Id prefix of administrative documents that never reach the index
pub const ADMIN_ID_PREFIX: &str = "_design";

/// One entry of a change feed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Change {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
}

impl Change {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            deleted: false,
        }
    }

    pub fn deletion(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            deleted: true,
        }
    }

    /// Whether the id belongs to the administrative namespace
    pub fn is_admin(&self) -> bool {
        self.id.starts_with(ADMIN_ID_PREFIX)
    }
}

/// Every change since a position, plus the feed's new terminal position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangesBatch {
    pub changes: Vec<Change>,
    pub last: Position,
}

/// Outcome of fetching the current state of a changed record
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentFetch {
    Found(SourceRecord),
    /// Removed from the store after the feed was read
    Vanished,
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// All changes after `since`, in feed order
    async fn changes_since(&self, since: &Position) -> Result<ChangesBatch>;

    async fn fetch_document(&self, id: &str) -> Result<DocumentFetch>;
}
