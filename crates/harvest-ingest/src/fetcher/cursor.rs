//! Cursor-mark pagination

use async_trait::async_trait;
use std::collections::VecDeque;
use tracing::{debug, error, warn};

use super::{CursorSource, FetchState, Fetcher, PageCursor, CURSOR_START};
use crate::error::{HarvestError, Result};
use crate::record::SourceRecord;

/// Fetcher over a source that hands back an opaque cursor with every page.
///
/// Iteration ends when the reported total has been handed out, when the
/// source answers with an empty page, or when it returns the cursor it was
/// given (its terminal marker). An unchanged cursor ends iteration after the
/// records of that page are drained. Receiving more records than the reported
/// total is a [`HarvestError::Consistency`] failure.
pub struct CursorFetcher<S> {
    source: S,
    buffer: VecDeque<SourceRecord>,
    state: FetchState,
    exhausted: bool,
}

impl<S: CursorSource> CursorFetcher<S> {
    /// Build a fetcher, requesting the first page from [`CURSOR_START`]
    pub async fn new(source: S) -> Result<Self> {
        let first = source
            .fetch_after(CURSOR_START)
            .await
            .map_err(|e| HarvestError::source_unavailable(source.name(), e))?;

        debug!(source = source.name(), total = first.total, "Cursor fetcher ready");

        let exhausted = first.items.is_empty() || first.next_cursor == CURSOR_START;
        Ok(Self {
            source,
            buffer: first.items.into(),
            state: FetchState {
                cursor: PageCursor::Mark(first.next_cursor),
                reported_total: first.total,
                yielded: 0,
            },
            exhausted,
        })
    }

    fn overflow(&mut self) -> HarvestError {
        let fetched = self.state.yielded + 1 + self.buffer.len() as u64;
        self.buffer.clear();
        self.exhausted = true;
        error!(
            source = self.source.name(),
            fetched,
            reported = self.state.reported_total,
            "Source returned more records than its reported total"
        );
        HarvestError::Consistency {
            fetched,
            reported: self.state.reported_total,
        }
    }

    fn current_mark(&self) -> &str {
        match &self.state.cursor {
            PageCursor::Mark(mark) => mark,
            PageCursor::Page(_) => CURSOR_START,
        }
    }
}

#[async_trait]
impl<S: CursorSource> Fetcher for CursorFetcher<S> {
    fn has_more(&self) -> bool {
        !self.buffer.is_empty()
            || (!self.exhausted && self.state.yielded < self.state.reported_total)
    }

    async fn next(&mut self) -> Result<Option<SourceRecord>> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                if self.state.yielded >= self.state.reported_total {
                    return Err(self.overflow());
                }
                self.state.yielded += 1;
                return Ok(Some(record));
            }

            if self.exhausted || self.state.yielded >= self.state.reported_total {
                self.exhausted = true;
                return Ok(None);
            }

            let sent = self.current_mark().to_string();
            let page = self.source.fetch_after(&sent).await?;
            debug!(
                source = self.source.name(),
                items = page.items.len(),
                cursor = %page.next_cursor,
                "Fetched cursor page"
            );

            if page.items.is_empty() {
                if self.state.yielded < self.state.reported_total {
                    warn!(
                        source = self.source.name(),
                        yielded = self.state.yielded,
                        reported = self.state.reported_total,
                        "Source ran out of records before its reported total"
                    );
                }
                self.exhausted = true;
                return Ok(None);
            }

            if page.next_cursor == sent {
                self.exhausted = true;
            }
            self.state.cursor = PageCursor::Mark(page.next_cursor);
            self.buffer.extend(page.items);
        }
    }

    fn state(&self) -> &FetchState {
        &self.state
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::fetcher::tests::{ids, numbered};
    use crate::fetcher::{drain, CursorPage};
    use std::sync::Mutex;

    /// Serves `actual` records in pages of `page_size`, cursors are offsets
    struct FakeCursor {
        reported: u64,
        actual: u64,
        page_size: u64,
        sticky_after: Option<u64>,
        fail_first: bool,
        sent: Mutex<Vec<String>>,
    }

    impl FakeCursor {
        fn new(reported: u64, actual: u64, page_size: u64) -> Self {
            Self {
                reported,
                actual,
                page_size,
                sticky_after: None,
                fail_first: false,
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CursorSource for FakeCursor {
        fn name(&self) -> &str {
            "fake-cursor"
        }

        async fn fetch_after(&self, cursor: &str) -> Result<CursorPage> {
            self.sent.lock().unwrap().push(cursor.to_string());
            if self.fail_first {
                return Err(HarvestError::source_unavailable("fake-cursor", "connection refused"));
            }
            let start: u64 = if cursor == CURSOR_START { 0 } else { cursor.parse().unwrap() };
            let end = (start + self.page_size).min(self.actual);
            let next = match self.sticky_after {
                Some(limit) if end >= limit => cursor.to_string(),
                _ => end.to_string(),
            };
            Ok(CursorPage {
                total: self.reported,
                items: (start..end).map(numbered).collect(),
                next_cursor: next,
            })
        }
    }

    #[tokio::test]
    async fn test_yields_every_record() {
        let mut fetcher = CursorFetcher::new(FakeCursor::new(7, 7, 3)).await.unwrap();
        let records = drain(&mut fetcher).await.unwrap();
        assert_eq!(ids(&records), (0..7).collect::<Vec<_>>());
        assert_eq!(fetcher.state().yielded, 7);
        assert!(!fetcher.has_more());
        // no request is made once the total has been reached
        assert_eq!(*fetcher.source.sent.lock().unwrap(), vec!["*", "3", "6"]);
    }

    #[tokio::test]
    async fn test_empty_page_ends_iteration() {
        let mut fetcher = CursorFetcher::new(FakeCursor::new(10, 4, 2)).await.unwrap();
        let records = drain(&mut fetcher).await.unwrap();
        assert_eq!(records.len(), 4);
        assert!(!fetcher.has_more());
    }

    #[tokio::test]
    async fn test_overfull_page_is_consistency_error() {
        // a single page of five records announced as two
        let mut fetcher = CursorFetcher::new(FakeCursor::new(2, 5, 5)).await.unwrap();
        assert!(fetcher.next().await.unwrap().is_some());
        assert!(fetcher.next().await.unwrap().is_some());

        let err = fetcher.next().await.unwrap_err();
        assert!(matches!(
            err,
            HarvestError::Consistency {
                fetched: 5,
                reported: 2
            }
        ));
        assert_eq!(fetcher.state().yielded, 2);
        assert!(!fetcher.has_more());
        assert!(fetcher.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_construction_failure_is_source_unavailable() {
        let mut source = FakeCursor::new(3, 3, 3);
        source.fail_first = true;
        let err = CursorFetcher::new(source).await.err().unwrap();
        assert!(matches!(err, HarvestError::SourceUnavailable { ref source_name, .. } if source_name == "fake-cursor"));
    }

    #[tokio::test]
    async fn test_unchanged_cursor_ends_iteration() {
        let mut source = FakeCursor::new(10, 10, 2);
        source.sticky_after = Some(4);
        let mut fetcher = CursorFetcher::new(source).await.unwrap();
        let records = drain(&mut fetcher).await.unwrap();
        assert_eq!(ids(&records), vec![0, 1, 2, 3]);
        assert_eq!(*fetcher.source.sent.lock().unwrap(), vec!["*", "2"]);
    }

    #[tokio::test]
    async fn test_empty_result_set() {
        let mut fetcher = CursorFetcher::new(FakeCursor::new(0, 0, 5)).await.unwrap();
        assert!(!fetcher.has_more());
        assert!(fetcher.next().await.unwrap().is_none());
    }
}
