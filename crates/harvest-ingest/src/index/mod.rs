//! Search index clients

pub mod solr;

use async_trait::async_trait;

use crate::error::IndexError;
use crate::record::IndexDocument;

pub use solr::SolrIndex;

/// Write side of a search index.
///
/// Implementations report malformed requests as [`IndexError::Client`] and
/// every other failure as [`IndexError::Fatal`].
#[async_trait]
pub trait IndexClient: Send + Sync {
    async fn upsert(&self, doc: &IndexDocument) -> Result<(), IndexError>;

    /// Remove a document; deleting an absent id succeeds
    async fn delete(&self, id: &str) -> Result<(), IndexError>;

    /// Make every preceding upsert and delete durable and visible
    async fn commit(&self) -> Result<(), IndexError>;
}
