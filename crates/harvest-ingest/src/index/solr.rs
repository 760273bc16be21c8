//! JSON update handler client

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::IndexClient;
use crate::error::IndexError;
use crate::http::{error_body, join};
use crate::record::IndexDocument;

pub struct SolrIndex {
    client: Client,
    update_url: String,
}

impl SolrIndex {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            update_url: join(base_url, "update"),
        }
    }

    async fn post(&self, body: &Value, commit: bool) -> Result<(), IndexError> {
        let mut request = self.client.post(&self.update_url).json(body);
        if commit {
            request = request.query(&[("commit", "true")]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| IndexError::Fatal(format!("request to {} failed: {}", self.update_url, e)))?;
        classify(response).await
    }
}

async fn classify(response: Response) -> Result<(), IndexError> {
    if response.status().is_success() {
        return Ok(());
    }
    let (status, body) = error_body(response).await;
    if status.is_client_error() {
        Err(IndexError::Client {
            status: status.as_u16(),
            message: body,
        })
    } else {
        Err(IndexError::Fatal(format!("status {}: {}", status, body)))
    }
}

#[async_trait]
impl IndexClient for SolrIndex {
    async fn upsert(&self, doc: &IndexDocument) -> Result<(), IndexError> {
        let body = serde_json::to_value([doc])
            .map_err(|e| IndexError::Fatal(format!("document not serializable: {}", e)))?;
        self.post(&body, false).await
    }

    async fn delete(&self, id: &str) -> Result<(), IndexError> {
        debug!(id, "Deleting from index");
        self.post(&json!({ "delete": { "id": id } }), false).await
    }

    #[instrument(skip(self), fields(url = %self.update_url))]
    async fn commit(&self) -> Result<(), IndexError> {
        self.post(&json!({ "commit": {} }), true).await
    }
}
