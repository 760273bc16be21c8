//! Durable change-feed checkpoints
//!
//! A checkpoint is one position per deployment scope, stored as plain text
//! under `couchdb_since/<scope>` in a [`CheckpointBackend`]. A scope that was
//! never written reads as [`Position::start`], so the first pass replays the
//! whole feed.

pub mod file;
pub mod memory;
pub mod s3;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{HarvestError, Result};
use harvest_common::Position;

pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use s3::{S3Backend, S3Config};

/// Key prefix shared by every scope
pub const KEY_PREFIX: &str = "couchdb_since";

/// Object key holding the checkpoint of `scope`
pub fn checkpoint_key(scope: &str) -> String {
    format!("{}/{}", KEY_PREFIX, scope)
}

/// Single-object storage
#[async_trait]
pub trait CheckpointBackend: Send + Sync {
    /// Object contents, or `None` when the key was never written
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<()>;
}

#[async_trait]
impl<B: CheckpointBackend + ?Sized> CheckpointBackend for Box<B> {
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get_object(key).await
    }

    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        (**self).put_object(key, bytes).await
    }
}

/// Reads and writes checkpoints through a backend
pub struct CheckpointStore<B> {
    backend: B,
}

impl<B: CheckpointBackend> CheckpointStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Stored position of `scope`, or the start of the feed
    pub async fn read(&self, scope: &str) -> Result<Position> {
        let key = checkpoint_key(scope);
        let Some(bytes) = self.backend.get_object(&key).await? else {
            info!(key = %key, "No checkpoint stored, starting from the beginning");
            return Ok(Position::start());
        };

        let text = String::from_utf8(bytes)
            .map_err(|e| HarvestError::checkpoint(format!("checkpoint {} is not UTF-8: {}", key, e)))?;
        let position = text
            .parse::<Position>()
            .map_err(|e| HarvestError::checkpoint(format!("checkpoint {} unreadable: {}", key, e)))?;

        debug!(key = %key, position = %position, "Checkpoint read");
        Ok(position)
    }

    /// Store `position` for `scope`.
    ///
    /// Returns `false` without writing when the stored numeric position is
    /// already ahead of `position`.
    pub async fn write(&self, scope: &str, position: &Position) -> Result<bool> {
        let stored = self.read(scope).await?;
        if position.is_behind(&stored) {
            warn!(
                scope,
                stored = %stored,
                candidate = %position,
                "Refusing to move checkpoint backwards"
            );
            return Ok(false);
        }

        let key = checkpoint_key(scope);
        self.backend
            .put_object(&key, position.to_string().into_bytes())
            .await?;
        info!(key = %key, position = %position, "Checkpoint written");
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_key() {
        assert_eq!(checkpoint_key("production"), "couchdb_since/production");
    }

    #[tokio::test]
    async fn test_unwritten_scope_reads_start() {
        let store = CheckpointStore::new(MemoryBackend::new());
        assert_eq!(store.read("stage").await.unwrap(), Position::start());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let store = CheckpointStore::new(MemoryBackend::new());
        assert!(store.write("stage", &Position::Seq(42)).await.unwrap());
        assert_eq!(store.read("stage").await.unwrap(), Position::Seq(42));
        assert_eq!(
            store.backend().get_object("couchdb_since/stage").await.unwrap(),
            Some(b"42".to_vec())
        );
        // scopes are independent
        assert_eq!(store.read("production").await.unwrap(), Position::start());
    }

    #[tokio::test]
    async fn test_opaque_tokens_round_trip() {
        let store = CheckpointStore::new(MemoryBackend::new());
        let token = Position::Token("88-g1AAAAFreJzLYWBg".to_string());
        store.write("stage", &token).await.unwrap();
        assert_eq!(store.read("stage").await.unwrap(), token);
    }

    #[tokio::test]
    async fn test_never_moves_backwards() {
        let store = CheckpointStore::new(MemoryBackend::new());
        store.write("stage", &Position::Seq(100)).await.unwrap();
        assert!(!store.write("stage", &Position::Seq(99)).await.unwrap());
        assert_eq!(store.read("stage").await.unwrap(), Position::Seq(100));
        assert!(store.write("stage", &Position::Seq(100)).await.unwrap());
    }

    #[tokio::test]
    async fn test_garbage_payload_is_backend_error() {
        let backend = MemoryBackend::new();
        backend
            .put_object("couchdb_since/stage", b"  ".to_vec())
            .await
            .unwrap();
        let store = CheckpointStore::new(backend);
        assert!(matches!(
            store.read("stage").await,
            Err(HarvestError::CheckpointBackend(_))
        ));
    }
}
