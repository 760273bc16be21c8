//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::checkpoint::file::DEFAULT_CHECKPOINT_DIR;
use crate::checkpoint::{CheckpointBackend, FileBackend, S3Backend, S3Config};
use crate::error::{HarvestError, Result};
use crate::http::DEFAULT_HTTP_TIMEOUT_SECS;
use crate::sync::DEFAULT_SYNC_CONCURRENCY;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Checkpoint backend used when CHECKPOINT_BACKEND is unset.
pub const DEFAULT_CHECKPOINT_BACKEND: &str = "s3";

/// Key used by the Flickr fetcher when FLICKR_API_KEY is unset.
pub const DEFAULT_FLICKR_API_KEY: &str = "boguskey";

/// Where checkpoints are persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum CheckpointConfig {
    S3(S3Config),
    File { dir: PathBuf },
}

impl CheckpointConfig {
    fn from_env() -> Result<Self> {
        let backend = std::env::var("CHECKPOINT_BACKEND")
            .unwrap_or_else(|_| DEFAULT_CHECKPOINT_BACKEND.to_string());
        match backend.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(CheckpointConfig::S3(S3Config::from_env())),
            "file" => Ok(CheckpointConfig::File {
                dir: std::env::var("CHECKPOINT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_CHECKPOINT_DIR)),
            }),
            other => Err(HarvestError::config(format!(
                "CHECKPOINT_BACKEND must be 's3' or 'file', got '{}'",
                other
            ))),
        }
    }

    /// Connect the configured backend
    pub async fn connect(&self) -> Result<Box<dyn CheckpointBackend>> {
        Ok(match self {
            CheckpointConfig::S3(s3) => Box::new(S3Backend::new(s3.clone()).await?),
            CheckpointConfig::File { dir } => Box::new(FileBackend::new(dir.clone())),
        })
    }
}

/// Settings shared by every outbound HTTP client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    pub http_timeout_secs: u64,
    pub flickr_api_key: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            flickr_api_key: DEFAULT_FLICKR_API_KEY.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            http_timeout_secs: std::env::var("HARVEST_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            flickr_api_key: std::env::var("FLICKR_API_KEY")
                .unwrap_or_else(|_| DEFAULT_FLICKR_API_KEY.to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.http_timeout_secs == 0 {
            return Err(HarvestError::config("HTTP timeout must be greater than 0"));
        }
        Ok(())
    }
}

/// Sync pass configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Deployment scope of the checkpoint (DATA_BRANCH)
    pub scope: String,
    pub checkpoint: CheckpointConfig,
    pub fetch: FetchConfig,
    pub concurrency: usize,
}

impl SyncConfig {
    /// Load configuration from `.env`, the environment and defaults
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let scope = std::env::var("DATA_BRANCH").map_err(|_| {
            HarvestError::config("Please set the DATA_BRANCH environment variable")
        })?;

        let config = Self {
            scope,
            checkpoint: CheckpointConfig::from_env()?,
            fetch: FetchConfig::from_env()?,
            concurrency: std::env::var("SYNC_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SYNC_CONCURRENCY),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.scope.trim().is_empty() {
            return Err(HarvestError::config("DATA_BRANCH cannot be empty"));
        }
        if self.concurrency == 0 {
            return Err(HarvestError::config("SYNC_CONCURRENCY must be greater than 0"));
        }
        if let CheckpointConfig::S3(s3) = &self.checkpoint {
            if s3.bucket.is_empty() {
                return Err(HarvestError::config("CHECKPOINT_BUCKET cannot be empty"));
            }
        }
        self.fetch.validate()
    }
}
