//! Pull iterators over paginated upstream sources
//!
//! A [`Fetcher`] hides how a source paginates. Two strategies are provided:
//!
//! - [`PagedFetcher`]: numbered pages of a fixed size over a [`PageSource`]
//! - [`CursorFetcher`]: opaque cursor marks over a [`CursorSource`]
//!
//! Both learn the source's reported total with one request at construction
//! and hold themselves to it. Fetchers are single-pass and not restartable.
//!
//! # Example
//!
//! ```no_run
//! use harvest_ingest::fetcher::{drain, solr::SolrPageSource, PagedFetcher};
//!
//! # async fn run() -> harvest_ingest::Result<()> {
//! let client = harvest_ingest::http::build_client(std::time::Duration::from_secs(30))?;
//! let source = SolrPageSource::new(client, "http://localhost:8983/solr/dc", "*:*");
//! let mut fetcher = PagedFetcher::new(source, 100).await?;
//! let records = drain(&mut fetcher).await?;
//! println!("{} records", records.len());
//! # Ok(())
//! # }
//! ```

pub mod cursor;
pub mod emuseum;
pub mod flickr;
pub mod paged;
pub mod solr;
pub mod xml;

use async_trait::async_trait;
use serde::Serialize;
use serde_jsonlines::JsonLinesWriter;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info};

use crate::error::Result;
use crate::record::SourceRecord;
use harvest_common::Pagination;

pub use cursor::CursorFetcher;
pub use paged::PagedFetcher;

/// Default number of records requested per page
pub const DEFAULT_PAGE_SIZE: u64 = 500;

/// Cursor mark that starts a cursor-paginated query
pub const CURSOR_START: &str = "*";

/// Where a fetcher currently stands in its source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageCursor {
    /// Last page number requested
    Page(u64),
    /// Cursor mark to send with the next request
    Mark(String),
}

/// Bookkeeping shared by every fetch strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchState {
    pub cursor: PageCursor,
    /// Item count the source reported when the fetcher was built
    pub reported_total: u64,
    /// Items handed out so far
    pub yielded: u64,
}

/// A single-pass pull iterator over one upstream result set
#[async_trait]
pub trait Fetcher: Send {
    /// Whether [`Fetcher::next`] may still return a record
    fn has_more(&self) -> bool;

    /// The next record, or `None` once the result set is exhausted
    async fn next(&mut self) -> Result<Option<SourceRecord>>;

    fn state(&self) -> &FetchState;
}

/// One page of a numbered-page source
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub total: u64,
    pub items: Vec<SourceRecord>,
}

/// One page of a cursor-mark source
#[derive(Debug, Clone, Default)]
pub struct CursorPage {
    pub total: u64,
    pub items: Vec<SourceRecord>,
    /// Mark to send with the following request
    pub next_cursor: String,
}

/// Upstream API addressed by page number
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Short name used in errors and logs
    fn name(&self) -> &str;

    async fn fetch_page(&self, page: Pagination) -> Result<Page>;
}

/// Upstream API addressed by opaque cursor mark
#[async_trait]
pub trait CursorSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_after(&self, cursor: &str) -> Result<CursorPage>;
}

/// Collect every remaining record of a fetcher
pub async fn drain<F>(fetcher: &mut F) -> Result<Vec<SourceRecord>>
where
    F: Fetcher + ?Sized,
{
    let mut records = Vec::new();
    while let Some(record) = fetcher.next().await? {
        records.push(record);
    }
    debug!(count = records.len(), "Fetcher drained");
    Ok(records)
}

/// Stream every remaining record to `path`, one JSON document per line.
///
/// Returns the number of records written.
pub async fn write_jsonl<F>(fetcher: &mut F, path: &Path) -> Result<u64>
where
    F: Fetcher + ?Sized,
{
    let file = File::create(path)?;
    let mut writer = JsonLinesWriter::new(BufWriter::new(file));
    let mut written = 0u64;

    while let Some(record) = fetcher.next().await? {
        writer.write(&record)?;
        written += 1;
        if written % 1000 == 0 {
            info!(written, total = fetcher.state().reported_total, "Harvest progress");
        }
    }

    writer.flush()?;
    info!(written, path = %path.display(), "Harvest written");
    Ok(written)
}
