//! eMuseum collection sites
//!
//! Objects are listed from `{base}/search/*/objects/xml`, filtered to
//! approved objects and addressed by page number. The site fixes the page
//! size, so the fetcher must be built with the same size the site serves.
//!
//! Each `object` element becomes a record. Attributes are dropped; an
//! element's separate runs of text land under `text`, `text2` and so on;
//! fields repeated within one object are numbered `name1`, `name2`.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::debug;

use super::xml::{to_json_with, XmlOptions, TEXT_KEY};
use super::{Page, PageSource};
use crate::error::{HarvestError, Result};
use crate::http::{error_body, join};
use crate::record::SourceRecord;
use harvest_common::Pagination;

const OBJECTS_PATH: &str = "search/*/objects/xml";
const APPROVED_FILTER: &str = "approved:true";

const XML_OPTIONS: XmlOptions = XmlOptions {
    attributes: false,
    numbered_text: true,
};

pub struct EMuseumSource {
    client: Client,
    objects_url: String,
    filter: String,
}

impl EMuseumSource {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            objects_url: join(base_url, OBJECTS_PATH),
            filter: APPROVED_FILTER.to_string(),
        }
    }

    /// Replace the default `approved:true` object filter
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }
}

#[async_trait]
impl PageSource for EMuseumSource {
    fn name(&self) -> &str {
        "emuseum"
    }

    async fn fetch_page(&self, page: Pagination) -> Result<Page> {
        let params = [("filter", self.filter.clone()), ("page", page.page.to_string())];
        let response = self.client.get(&self.objects_url).query(&params).send().await?;
        if !response.status().is_success() {
            let (status, body) = error_body(response).await;
            return Err(HarvestError::source_unavailable(
                self.name(),
                format!("status {}: {}", status, body),
            ));
        }

        let text = response.text().await?;
        let (root, mut body) = to_json_with(&text, XML_OPTIONS)?;
        if root != "objects" {
            return Err(HarvestError::Xml(format!("unexpected root element <{}>", root)));
        }

        let total = body
            .get("resultsCount")
            .and_then(|count| count.get(TEXT_KEY))
            .and_then(Value::as_str)
            .and_then(|count| count.trim().parse::<u64>().ok())
            .ok_or_else(|| HarvestError::Xml("response has no numeric resultsCount".to_string()))?;

        let items: Vec<SourceRecord> = match body.remove("object") {
            Some(Value::Array(objects)) => objects.into_iter().filter_map(object_record).collect(),
            Some(single) => object_record(single).into_iter().collect(),
            None => Vec::new(),
        };
        debug!(page = page.page, objects = items.len(), total, "Listed eMuseum objects");

        Ok(Page { total, items })
    }
}

/// Number fields that repeat within one object
fn object_record(object: Value) -> Option<SourceRecord> {
    let Value::Object(fields) = object else {
        return None;
    };
    let mut record = Map::new();
    for (name, value) in fields {
        match value {
            Value::Array(repeats) => {
                for (i, repeat) in repeats.into_iter().enumerate() {
                    record.insert(format!("{}{}", name, i + 1), repeat);
                }
            },
            single => {
                record.insert(name, single);
            },
        }
    }
    Some(record)
}
