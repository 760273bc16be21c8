//! One synchronization pass from a change feed into the search index
//!
//! ```text
//! read checkpoint -> pull changes -> route each change -> commit index -> write checkpoint
//! ```
//!
//! The feed's terminal position is recorded when the changes are pulled and
//! becomes the candidate checkpoint, however many records are later skipped.
//! Per-record failures are logged and counted. Pass-level failures (feed,
//! fatal index errors, checkpoint storage) abort before the checkpoint is
//! written, so the next pass re-reads the same window.
//!
//! Documents are fetched and mapped concurrently; index operations are then
//! applied strictly in feed order, and the commit follows all of them.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::checkpoint::{CheckpointBackend, CheckpointStore};
use crate::error::{HarvestError, RecordError, Result};
use crate::feed::{Change, ChangeFeed, DocumentFetch};
use crate::index::IndexClient;
use crate::mapper;
use crate::record::IndexDocument;
use harvest_common::Position;

/// Default number of documents fetched and mapped at once
pub const DEFAULT_SYNC_CONCURRENCY: usize = 8;

/// Upserts between progress log lines
pub const PROGRESS_INTERVAL: u64 = 1000;

/// How a pass chooses its starting point
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Start here instead of at the stored checkpoint
    pub since: Option<Position>,
    /// Replay the whole feed; the stored checkpoint is never advanced
    pub full_reindex: bool,
}

impl SyncOptions {
    pub fn full_reindex() -> Self {
        Self {
            since: None,
            full_reindex: true,
        }
    }

    pub fn since(position: Position) -> Self {
        Self {
            since: Some(position),
            full_reindex: false,
        }
    }
}

/// Counters and positions of a completed pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub previous: Position,
    pub last: Position,
    pub updated: u64,
    pub deleted: u64,
    pub admin_skipped: u64,
    /// Records skipped by validation or mapping
    pub rejected: u64,
    /// Upserts the index refused as malformed
    pub index_rejected: u64,
    pub delete_failures: u64,
    /// Changed records gone from the store by the time they were fetched
    pub vanished: u64,
    pub checkpoint_written: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    fn begin(previous: Position, last: Position) -> Self {
        let now = Utc::now();
        Self {
            previous,
            last,
            updated: 0,
            deleted: 0,
            admin_skipped: 0,
            rejected: 0,
            index_rejected: 0,
            delete_failures: 0,
            vanished: 0,
            checkpoint_written: false,
            started_at: now,
            finished_at: now,
        }
    }
}

/// What to do with one change, decided before touching the index
enum Route {
    Admin,
    /// Store `_id` of the deleted document. Upserts are keyed by the resolved
    /// identifier instead, so an entry indexed under an ARK or content hash
    /// is not reached by this delete.
    Delete(String),
    Upsert(Box<IndexDocument>),
    Rejected(RecordError),
    Vanished(String),
}

pub struct SyncEngine<F, I, B> {
    feed: F,
    index: I,
    checkpoints: CheckpointStore<B>,
    scope: String,
    concurrency: usize,
}

impl<F, I, B> SyncEngine<F, I, B>
where
    F: ChangeFeed,
    I: IndexClient,
    B: CheckpointBackend,
{
    pub fn new(feed: F, index: I, checkpoints: CheckpointStore<B>, scope: impl Into<String>) -> Self {
        Self {
            feed,
            index,
            checkpoints,
            scope: scope.into(),
            concurrency: DEFAULT_SYNC_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn checkpoints(&self) -> &CheckpointStore<B> {
        &self.checkpoints
    }

    /// Run one pass
    pub async fn run(&self, options: &SyncOptions) -> Result<SyncReport> {
        let previous = if options.full_reindex {
            info!(scope = %self.scope, "Full reindex requested, replaying from the start");
            Position::start()
        } else if let Some(since) = &options.since {
            since.clone()
        } else {
            self.checkpoints.read(&self.scope).await?
        };

        let batch = self.feed.changes_since(&previous).await?;
        let mut report = SyncReport::begin(previous, batch.last.clone());
        info!(
            scope = %self.scope,
            since = %report.previous,
            last = %report.last,
            changes = batch.changes.len(),
            "Sync pass started"
        );

        let mut routes = stream::iter(batch.changes)
            .map(|change| self.route(change))
            .buffered(self.concurrency);

        while let Some(route) = routes.next().await {
            self.apply(route?, &mut report).await?;
        }

        self.index.commit().await?;
        info!("Index commit complete");

        if options.full_reindex {
            info!("Full reindex, stored checkpoint left unchanged");
        } else {
            report.checkpoint_written = self.checkpoints.write(&self.scope, &report.last).await?;
        }

        report.finished_at = Utc::now();
        info!(
            updated = report.updated,
            deleted = report.deleted,
            admin_skipped = report.admin_skipped,
            rejected = report.rejected,
            index_rejected = report.index_rejected,
            delete_failures = report.delete_failures,
            vanished = report.vanished,
            previous = %report.previous,
            last = %report.last,
            "Sync pass finished"
        );
        Ok(report)
    }

    /// Classify a change, fetching and mapping its record when needed
    async fn route(&self, change: Change) -> Result<Route> {
        if change.is_admin() {
            return Ok(Route::Admin);
        }
        if change.deleted {
            return Ok(Route::Delete(change.id));
        }

        let record = match self.feed.fetch_document(&change.id).await? {
            DocumentFetch::Found(record) => record,
            DocumentFetch::Vanished => return Ok(Route::Vanished(change.id)),
        };

        Ok(match mapper::transform(record) {
            Ok(doc) => Route::Upsert(Box::new(doc)),
            Err(e) => Route::Rejected(e),
        })
    }

    async fn apply(&self, route: Route, report: &mut SyncReport) -> Result<()> {
        match route {
            Route::Admin => report.admin_skipped += 1,
            Route::Vanished(id) => {
                warn!(id = %id, "Changed document no longer in store, skipping");
                report.vanished += 1;
            },
            Route::Rejected(e) => {
                warn!(error = %e, "Record skipped");
                report.rejected += 1;
            },
            Route::Delete(id) => match self.index.delete(&id).await {
                Ok(()) => {
                    debug!(id = %id, "Deleted");
                    report.deleted += 1;
                },
                Err(e) => {
                    warn!(id = %id, error = %e, "Delete failed, continuing");
                    report.delete_failures += 1;
                },
            },
            Route::Upsert(doc) => match self.index.upsert(&doc).await {
                Ok(()) => {
                    report.updated += 1;
                    if report.updated % PROGRESS_INTERVAL == 0 {
                        info!(updated = report.updated, "Sync progress");
                    }
                },
                Err(e) if e.is_client_error() => {
                    warn!(id = doc.id().unwrap_or_default(), error = %e, "Index rejected document");
                    report.index_rejected += 1;
                },
                Err(e) => return Err(HarvestError::from(e)),
            },
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::checkpoint::MemoryBackend;
    use crate::error::IndexError;
    use crate::feed::ChangesBatch;
    use crate::mapper::tests::sample_record;
    use crate::record::SourceRecord;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    const SCOPE: &str = "test";

    struct FakeFeed {
        changes: Vec<Change>,
        last: Position,
        docs: HashMap<String, SourceRecord>,
        requested_since: Mutex<Vec<Position>>,
    }

    impl FakeFeed {
        fn new(last: u64) -> Self {
            Self {
                changes: Vec::new(),
                last: Position::Seq(last),
                docs: HashMap::new(),
                requested_since: Mutex::new(Vec::new()),
            }
        }

        fn with_doc(mut self, id: &str) -> Self {
            let mut record = sample_record();
            record.insert("_id".to_string(), json!(id));
            record["sourceResource"]["identifier"] = json!([id]);
            self.docs.insert(id.to_string(), record);
            self.changes.push(Change::new(id));
            self
        }

        fn with_change(mut self, change: Change) -> Self {
            self.changes.push(change);
            self
        }
    }

    #[async_trait]
    impl ChangeFeed for FakeFeed {
        async fn changes_since(&self, since: &Position) -> Result<ChangesBatch> {
            self.requested_since.lock().unwrap().push(since.clone());
            Ok(ChangesBatch {
                changes: self.changes.clone(),
                last: self.last.clone(),
            })
        }

        async fn fetch_document(&self, id: &str) -> Result<DocumentFetch> {
            Ok(match self.docs.get(id) {
                Some(record) => DocumentFetch::Found(record.clone()),
                None => DocumentFetch::Vanished,
            })
        }
    }

    #[derive(Default)]
    struct FakeIndex {
        ops: Mutex<Vec<String>>,
        fatal_ids: HashSet<String>,
        client_error_ids: HashSet<String>,
        failing_deletes: HashSet<String>,
        fail_commit: bool,
    }

    #[async_trait]
    impl IndexClient for FakeIndex {
        async fn upsert(&self, doc: &IndexDocument) -> std::result::Result<(), IndexError> {
            let id = doc.get("harvest_id_s").and_then(|v| v.first_text()).unwrap_or_default();
            if self.fatal_ids.contains(id) {
                return Err(IndexError::Fatal("connection refused".to_string()));
            }
            if self.client_error_ids.contains(id) {
                return Err(IndexError::Client {
                    status: 400,
                    message: "unknown field".to_string(),
                });
            }
            self.ops.lock().unwrap().push(format!("upsert {}", id));
            Ok(())
        }

        async fn delete(&self, id: &str) -> std::result::Result<(), IndexError> {
            if self.failing_deletes.contains(id) {
                return Err(IndexError::Fatal("timeout".to_string()));
            }
            self.ops.lock().unwrap().push(format!("delete {}", id));
            Ok(())
        }

        async fn commit(&self) -> std::result::Result<(), IndexError> {
            if self.fail_commit {
                return Err(IndexError::Fatal("commit failed".to_string()));
            }
            self.ops.lock().unwrap().push("commit".to_string());
            Ok(())
        }
    }

    fn engine(feed: FakeFeed, index: FakeIndex) -> (SyncEngine<FakeFeed, FakeIndex, MemoryBackend>, MemoryBackend) {
        let backend = MemoryBackend::new();
        let engine = SyncEngine::new(feed, index, CheckpointStore::new(backend.clone()), SCOPE)
            .with_concurrency(2);
        (engine, backend)
    }

    async fn stored(backend: &MemoryBackend) -> Position {
        CheckpointStore::new(backend.clone()).read(SCOPE).await.unwrap()
    }

    /// Fake ids double as identifiers without an ARK, so ids are hashed
    fn indexed_id(store_id: &str) -> String {
        harvest_common::checksum::sha256_hex(store_id)
    }

    #[tokio::test]
    async fn test_successful_pass_advances_checkpoint() {
        let feed = FakeFeed::new(57)
            .with_doc("a")
            .with_change(Change::deletion("gone"))
            .with_doc("b");
        let (engine, backend) = engine(feed, FakeIndex::default());

        let report = engine.run(&SyncOptions::default()).await.unwrap();

        assert_eq!(report.updated, 2);
        assert_eq!(report.deleted, 1);
        assert!(report.checkpoint_written);
        assert_eq!(report.previous, Position::start());
        assert_eq!(stored(&backend).await, Position::Seq(57));
        assert_eq!(
            *engine.index.ops.lock().unwrap(),
            vec![
                format!("upsert {}", indexed_id("a")),
                "delete gone".to_string(),
                format!("upsert {}", indexed_id("b")),
                "commit".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_resumes_from_stored_checkpoint() {
        let (engine, backend) = engine(FakeFeed::new(90).with_doc("a"), FakeIndex::default());
        CheckpointStore::new(backend.clone())
            .write(SCOPE, &Position::Seq(40))
            .await
            .unwrap();

        let report = engine.run(&SyncOptions::default()).await.unwrap();
        assert_eq!(report.previous, Position::Seq(40));
        assert_eq!(*engine.feed.requested_since.lock().unwrap(), vec![Position::Seq(40)]);
        assert_eq!(stored(&backend).await, Position::Seq(90));
    }

    #[tokio::test]
    async fn test_fatal_upsert_leaves_checkpoint_unchanged() {
        let index = FakeIndex {
            fatal_ids: HashSet::from([indexed_id("b")]),
            ..FakeIndex::default()
        };
        let feed = FakeFeed::new(99).with_doc("a").with_doc("b").with_doc("c");
        let (engine, backend) = engine(feed, index);

        let err = engine.run(&SyncOptions::default()).await.unwrap_err();

        assert!(matches!(err, HarvestError::IndexFatal(_)));
        assert!(backend.is_empty());
        assert!(!engine.index.ops.lock().unwrap().contains(&"commit".to_string()));
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_checkpoint_unchanged() {
        let index = FakeIndex {
            fail_commit: true,
            ..FakeIndex::default()
        };
        let (engine, backend) = engine(FakeFeed::new(5).with_doc("a"), index);
        assert!(engine.run(&SyncOptions::default()).await.is_err());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_full_reindex_never_writes_checkpoint() {
        let (engine, backend) = engine(FakeFeed::new(500).with_doc("a"), FakeIndex::default());
        CheckpointStore::new(backend.clone())
            .write(SCOPE, &Position::Seq(200))
            .await
            .unwrap();

        let report = engine.run(&SyncOptions::full_reindex()).await.unwrap();

        assert!(!report.checkpoint_written);
        assert_eq!(report.updated, 1);
        assert_eq!(*engine.feed.requested_since.lock().unwrap(), vec![Position::start()]);
        assert_eq!(stored(&backend).await, Position::Seq(200));
    }

    #[tokio::test]
    async fn test_per_record_failures_do_not_abort() {
        let index = FakeIndex {
            client_error_ids: HashSet::from([indexed_id("bad-field")]),
            failing_deletes: HashSet::from(["stuck".to_string()]),
            ..FakeIndex::default()
        };
        let mut feed = FakeFeed::new(12)
            .with_change(Change::new("_design/all_provider_docs"))
            .with_doc("ok")
            .with_doc("bad-field")
            .with_doc("no-title")
            .with_change(Change::new("vanished"))
            .with_change(Change::deletion("never-indexed"))
            .with_change(Change::deletion("stuck"));
        feed.docs.get_mut("no-title").unwrap()["sourceResource"]
            .as_object_mut()
            .unwrap()
            .remove("title");
        let (engine, backend) = engine(feed, index);

        let report = engine.run(&SyncOptions::default()).await.unwrap();

        assert_eq!(report.admin_skipped, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.index_rejected, 1);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.vanished, 1);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.delete_failures, 1);
        assert_eq!(stored(&backend).await, Position::Seq(12));
    }

    #[tokio::test]
    async fn test_delete_uses_store_id_not_indexed_id() {
        let feed = FakeFeed::new(8).with_doc("a").with_change(Change::deletion("a"));
        let (engine, _backend) = engine(feed, FakeIndex::default());

        engine.run(&SyncOptions::default()).await.unwrap();

        assert_eq!(
            *engine.index.ops.lock().unwrap(),
            vec![
                format!("upsert {}", indexed_id("a")),
                "delete a".to_string(),
                "commit".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_explicit_since_overrides_checkpoint() {
        let (engine, backend) = engine(FakeFeed::new(30), FakeIndex::default());
        let report = engine.run(&SyncOptions::since(Position::Seq(25))).await.unwrap();
        assert_eq!(report.previous, Position::Seq(25));
        assert_eq!(stored(&backend).await, Position::Seq(30));
    }
}
