//! Flickr public photos
//!
//! Listing uses `flickr.people.getPublicPhotos`; each listed photo is then
//! expanded with `flickr.photos.getInfo`, whose `photo` element becomes the
//! record.

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::debug;

use super::xml::to_json;
use super::{Page, PageSource};
use crate::error::{HarvestError, Result};
use crate::http::error_body;
use crate::record::SourceRecord;
use harvest_common::Pagination;

/// REST endpoint of the public API
pub const DEFAULT_FLICKR_API_URL: &str = "https://api.flickr.com/services/rest/";

/// Concurrent `getInfo` requests per page
pub const DEFAULT_INFO_CONCURRENCY: usize = 4;

const METHOD_PUBLIC_PHOTOS: &str = "flickr.people.getPublicPhotos";
const METHOD_PHOTO_INFO: &str = "flickr.photos.getInfo";

pub struct FlickrPhotoSource {
    client: Client,
    api_url: String,
    api_key: String,
    user_id: String,
    info_concurrency: usize,
}

impl FlickrPhotoSource {
    pub fn new(client: Client, api_key: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            client,
            api_url: DEFAULT_FLICKR_API_URL.to_string(),
            api_key: api_key.into(),
            user_id: user_id.into(),
            info_concurrency: DEFAULT_INFO_CONCURRENCY,
        }
    }

    /// Point at a different REST endpoint (a mirror or a test server)
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_info_concurrency(mut self, concurrency: usize) -> Self {
        self.info_concurrency = concurrency.max(1);
        self
    }

    /// Call one REST method and return the body of its `rsp` envelope
    async fn call(&self, params: &[(&str, String)]) -> Result<Map<String, Value>> {
        let response = self.client.get(&self.api_url).query(params).send().await?;
        if !response.status().is_success() {
            let (status, body) = error_body(response).await;
            return Err(HarvestError::source_unavailable(
                self.name(),
                format!("status {}: {}", status, body),
            ));
        }

        let text = response.text().await?;
        let (root, body) = to_json(&text)?;
        if root != "rsp" {
            return Err(HarvestError::Xml(format!("unexpected root element <{}>", root)));
        }
        if body.get("stat").and_then(Value::as_str) != Some("ok") {
            let reason = body
                .get("err")
                .and_then(|err| err.get("msg"))
                .and_then(Value::as_str)
                .unwrap_or("request failed");
            return Err(HarvestError::source_unavailable(self.name(), reason));
        }
        Ok(body)
    }

    async fn photo_info(&self, photo_id: String) -> Result<SourceRecord> {
        let params = [
            ("api_key", self.api_key.clone()),
            ("method", METHOD_PHOTO_INFO.to_string()),
            ("photo_id", photo_id.clone()),
        ];
        let mut body = self.call(&params).await?;
        match body.remove("photo") {
            Some(Value::Object(photo)) => Ok(photo),
            _ => Err(HarvestError::Xml(format!("no photo element for {}", photo_id))),
        }
    }
}

#[async_trait]
impl PageSource for FlickrPhotoSource {
    fn name(&self) -> &str {
        "flickr"
    }

    async fn fetch_page(&self, page: Pagination) -> Result<Page> {
        let params = [
            ("api_key", self.api_key.clone()),
            ("user_id", self.user_id.clone()),
            ("per_page", page.page_size.to_string()),
            ("method", METHOD_PUBLIC_PHOTOS.to_string()),
            ("page", page.page.to_string()),
        ];
        let body = self.call(&params).await?;
        let photos = body
            .get("photos")
            .ok_or_else(|| HarvestError::Xml("response has no photos element".to_string()))?;

        let total = photos
            .get("total")
            .and_then(Value::as_str)
            .and_then(|t| t.parse::<u64>().ok())
            .ok_or_else(|| HarvestError::Xml("photos element has no numeric total".to_string()))?;

        let ids: Vec<String> = match photos.get("photo") {
            Some(Value::Array(list)) => list.iter().filter_map(photo_id).collect(),
            Some(single) => photo_id(single).into_iter().collect(),
            None => Vec::new(),
        };
        debug!(page = page.page, photos = ids.len(), total, "Listed Flickr photos");

        // getInfo requests keep listing order
        let items = stream::iter(ids)
            .map(|id| self.photo_info(id))
            .buffered(self.info_concurrency)
            .try_collect()
            .await?;

        Ok(Page { total, items })
    }
}

fn photo_id(photo: &Value) -> Option<String> {
    photo.get("id").and_then(Value::as_str).map(str::to_string)
}
