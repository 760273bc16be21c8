//! Harvest Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Metadata harvesting and search-index synchronization.
//!
//! # Components
//!
//! - **Fetchers**: pull iterators over paginated upstream sources
//!   (page-number and cursor-mark strategies)
//! - **Mapper**: pure mapping from stored records to flat index documents
//! - **Checkpoints**: durable change-feed positions per deployment scope
//! - **Sync**: one pass from a change feed into the index, advancing the
//!   checkpoint only after the index commit
//!
//! # Example
//!
//! ```no_run
//! use harvest_ingest::checkpoint::{CheckpointStore, FileBackend};
//! use harvest_ingest::feed::CouchChangeFeed;
//! use harvest_ingest::index::SolrIndex;
//! use harvest_ingest::sync::{SyncEngine, SyncOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = harvest_ingest::http::build_client(std::time::Duration::from_secs(60))?;
//!     let feed = CouchChangeFeed::new(client.clone(), "http://localhost:5984", "ucldc");
//!     let index = SolrIndex::new(client, "http://localhost:8983/solr/dc");
//!     let store = CheckpointStore::new(FileBackend::new("./checkpoints"));
//!
//!     let report = SyncEngine::new(feed, index, store, "stage")
//!         .run(&SyncOptions::default())
//!         .await?;
//!     println!("{} updated, {} deleted", report.updated, report.deleted);
//!     Ok(())
//! }
//! ```

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod feed;
pub mod fetcher;
pub mod http;
pub mod index;
pub mod mapper;
pub mod record;
pub mod sync;

pub use error::{HarvestError, IndexError, RecordError, Result};
pub use record::{FieldValue, IndexDocument, SourceRecord};
