//! Document-store change feed over HTTP

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::{Change, ChangeFeed, ChangesBatch, DocumentFetch};
use crate::error::{HarvestError, Result};
use crate::http::{error_body, join};
use crate::record::SourceRecord;
use harvest_common::Position;

#[derive(Debug, Deserialize)]
struct ChangesResponse {
    results: Vec<Change>,
    last_seq: Position,
}

/// `_changes` and document reads against one database
pub struct CouchChangeFeed {
    client: Client,
    db_url: String,
}

impl CouchChangeFeed {
    pub fn new(client: Client, server_url: &str, database: &str) -> Self {
        Self {
            client,
            db_url: join(server_url, database),
        }
    }

    pub fn db_url(&self) -> &str {
        &self.db_url
    }

    /// Document URL with the id encoded as a single path segment
    fn document_url(&self, id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.db_url)
            .map_err(|e| HarvestError::ChangeFeed(format!("invalid database URL {}: {}", self.db_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| HarvestError::ChangeFeed(format!("database URL {} cannot hold a path", self.db_url)))?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }
}

#[async_trait]
impl ChangeFeed for CouchChangeFeed {
    #[instrument(skip(self), fields(db = %self.db_url))]
    async fn changes_since(&self, since: &Position) -> Result<ChangesBatch> {
        let url = join(&self.db_url, "_changes");
        let response = self
            .client
            .get(&url)
            .query(&[("since", since.to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, body) = error_body(response).await;
            return Err(HarvestError::ChangeFeed(format!(
                "changes request failed with status {}: {}",
                status, body
            )));
        }

        let body: ChangesResponse = response
            .json()
            .await
            .map_err(|e| HarvestError::ChangeFeed(format!("unreadable changes response: {}", e)))?;

        info!(
            changes = body.results.len(),
            since = %since,
            last = %body.last_seq,
            "Pulled change feed"
        );
        Ok(ChangesBatch {
            changes: body.results,
            last: body.last_seq,
        })
    }

    async fn fetch_document(&self, id: &str) -> Result<DocumentFetch> {
        let url = self.document_url(id)?;
        let response = self.client.get(url).send().await?;

        match response.status() {
            status if status.is_success() => {
                let record: SourceRecord = response.json().await.map_err(|e| {
                    HarvestError::ChangeFeed(format!("unreadable document {}: {}", id, e))
                })?;
                Ok(DocumentFetch::Found(record))
            },
            StatusCode::NOT_FOUND => {
                debug!(id, "Document vanished after the feed was read");
                Ok(DocumentFetch::Vanished)
            },
            _ => {
                let (status, body) = error_body(response).await;
                Err(HarvestError::ChangeFeed(format!(
                    "fetching document {} failed with status {}: {}",
                    id, status, body
                )))
            },
        }
    }
}
