//! Page-number pagination

use async_trait::async_trait;
use std::collections::VecDeque;
use tracing::{debug, error};

use super::{FetchState, Fetcher, PageCursor, PageSource};
use crate::error::{HarvestError, Result};
use crate::record::SourceRecord;
use harvest_common::Pagination;

/// Fetcher over a source addressed by page number.
///
/// The total reported by the first page is authoritative. Iteration ends
/// when exactly that many records have been handed out; running out of pages
/// early, or receiving more records than announced, is a
/// [`HarvestError::Consistency`] failure.
pub struct PagedFetcher<S> {
    source: S,
    pagination: Pagination,
    buffer: VecDeque<SourceRecord>,
    state: FetchState,
    finished: bool,
}

impl<S: PageSource> PagedFetcher<S> {
    /// Build a fetcher, requesting the first page to learn the total
    pub async fn new(source: S, page_size: u64) -> Result<Self> {
        let pagination = Pagination::first(page_size)?;
        let first = source
            .fetch_page(pagination)
            .await
            .map_err(|e| HarvestError::source_unavailable(source.name(), e))?;

        debug!(
            source = source.name(),
            total = first.total,
            page_size,
            "Paged fetcher ready"
        );

        Ok(Self {
            source,
            pagination,
            buffer: first.items.into(),
            state: FetchState {
                cursor: PageCursor::Page(pagination.page),
                reported_total: first.total,
                yielded: 0,
            },
            finished: false,
        })
    }

    fn consistency_error(&mut self, fetched: u64) -> HarvestError {
        self.finished = true;
        error!(
            source = self.source.name(),
            fetched,
            reported = self.state.reported_total,
            "Fetched count disagrees with reported total"
        );
        HarvestError::Consistency {
            fetched,
            reported: self.state.reported_total,
        }
    }
}

#[async_trait]
impl<S: PageSource> Fetcher for PagedFetcher<S> {
    fn has_more(&self) -> bool {
        !self.finished && (!self.buffer.is_empty() || self.state.yielded < self.state.reported_total)
    }

    async fn next(&mut self) -> Result<Option<SourceRecord>> {
        loop {
            if self.finished {
                return Ok(None);
            }

            if let Some(record) = self.buffer.pop_front() {
                if self.state.yielded >= self.state.reported_total {
                    let fetched = self.state.yielded + 1 + self.buffer.len() as u64;
                    return Err(self.consistency_error(fetched));
                }
                self.state.yielded += 1;
                return Ok(Some(record));
            }

            if self.state.yielded == self.state.reported_total {
                self.finished = true;
                return Ok(None);
            }

            // Every announced page has been consumed without reaching the total
            if self.pagination.page >= self.pagination.pages_for(self.state.reported_total) {
                let fetched = self.state.yielded;
                return Err(self.consistency_error(fetched));
            }

            self.pagination = self.pagination.next();
            self.state.cursor = PageCursor::Page(self.pagination.page);
            let page = self.source.fetch_page(self.pagination).await?;
            debug!(
                source = self.source.name(),
                page = self.pagination.page,
                items = page.items.len(),
                "Fetched page"
            );

            if page.items.is_empty() {
                let fetched = self.state.yielded;
                return Err(self.consistency_error(fetched));
            }
            self.buffer.extend(page.items);
        }
    }

    fn state(&self) -> &FetchState {
        &self.state
    }
}
