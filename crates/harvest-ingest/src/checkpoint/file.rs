//! Checkpoints as files under a local directory

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::CheckpointBackend;
use crate::error::{HarvestError, Result};

/// Default directory for the file backend
pub const DEFAULT_CHECKPOINT_DIR: &str = "./checkpoints";

/// One file per key; key segments become subdirectories
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(HarvestError::checkpoint(format!("invalid checkpoint key '{}'", key)));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

#[async_trait]
impl CheckpointBackend for FileBackend {
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HarvestError::checkpoint(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HarvestError::checkpoint(format!("failed to create {}: {}", parent.display(), e)))?;
        }

        // Write beside the target, then rename over it
        let staging = staging_path(&path)?;
        tokio::fs::write(&staging, &bytes)
            .await
            .map_err(|e| HarvestError::checkpoint(format!("failed to write {}: {}", staging.display(), e)))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|e| HarvestError::checkpoint(format!("failed to replace {}: {}", path.display(), e)))?;

        debug!(path = %path.display(), bytes = bytes.len(), "Checkpoint file written");
        Ok(())
    }
}

/// Sibling of `path` named after its full file name
fn staging_path(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| HarvestError::checkpoint(format!("no file name in {}", path.display())))?;
    Ok(path.with_file_name(format!("{}.tmp", name.to_string_lossy())))
}
