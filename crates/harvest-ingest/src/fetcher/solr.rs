//! Search-index replicas as fetch sources
//!
//! Both sources read the standard JSON response shape
//! (`response.numFound`, `response.docs`). The cursor source additionally
//! needs a sort on the unique key and reads `nextCursorMark`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{CursorPage, CursorSource, Page, PageSource, DEFAULT_PAGE_SIZE};
use crate::error::{HarvestError, Result};
use crate::http::{error_body, join};
use crate::record::SourceRecord;
use harvest_common::Pagination;

#[derive(Debug, Deserialize)]
struct SelectResponse {
    response: SelectResults,
    #[serde(rename = "nextCursorMark")]
    next_cursor_mark: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SelectResults {
    #[serde(rename = "numFound")]
    num_found: u64,
    #[serde(default)]
    docs: Vec<SourceRecord>,
}

async fn query(
    client: &Client,
    name: &str,
    url: &str,
    params: &[(&str, String)],
) -> Result<SelectResponse> {
    let response = client.get(url).query(params).send().await?;
    if !response.status().is_success() {
        let (status, body) = error_body(response).await;
        return Err(HarvestError::source_unavailable(
            name,
            format!("status {}: {}", status, body),
        ));
    }
    Ok(response.json().await?)
}

/// Page-number reads through `select?start=&rows=`
pub struct SolrPageSource {
    client: Client,
    url: String,
    query: String,
}

impl SolrPageSource {
    pub fn new(client: Client, base_url: &str, query: impl Into<String>) -> Self {
        Self {
            client,
            url: join(base_url, "select"),
            query: query.into(),
        }
    }
}

#[async_trait]
impl PageSource for SolrPageSource {
    fn name(&self) -> &str {
        "solr"
    }

    async fn fetch_page(&self, page: Pagination) -> Result<Page> {
        let params = [
            ("q", self.query.clone()),
            ("wt", "json".to_string()),
            ("start", page.offset().to_string()),
            ("rows", page.page_size.to_string()),
        ];
        let body = query(&self.client, self.name(), &self.url, &params).await?;
        Ok(Page {
            total: body.response.num_found,
            items: body.response.docs,
        })
    }
}

/// Cursor-mark reads through `query?sort=id asc&cursorMark=`
pub struct SolrCursorSource {
    client: Client,
    url: String,
    query: String,
    rows: u64,
}

impl SolrCursorSource {
    pub fn new(client: Client, base_url: &str, query: impl Into<String>) -> Self {
        Self {
            client,
            url: join(base_url, "query"),
            query: query.into(),
            rows: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_rows(mut self, rows: u64) -> Self {
        self.rows = rows;
        self
    }
}

#[async_trait]
impl CursorSource for SolrCursorSource {
    fn name(&self) -> &str {
        "solr-cursor"
    }

    async fn fetch_after(&self, cursor: &str) -> Result<CursorPage> {
        let params = [
            ("q", self.query.clone()),
            ("sort", "id asc".to_string()),
            ("wt", "json".to_string()),
            ("rows", self.rows.to_string()),
            ("cursorMark", cursor.to_string()),
        ];
        let body = query(&self.client, self.name(), &self.url, &params).await?;
        let next_cursor = body.next_cursor_mark.ok_or_else(|| {
            HarvestError::source_unavailable(self.name(), "response has no nextCursorMark")
        })?;
        Ok(CursorPage {
            total: body.response.num_found,
            items: body.response.docs,
            next_cursor,
        })
    }
}
