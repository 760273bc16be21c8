//! Checkpoints in an S3-compatible bucket

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::Region,
    error::DisplayErrorContext,
    primitives::ByteStream,
    Client,
};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, info, instrument};

use super::CheckpointBackend;
use crate::error::{HarvestError, Result};

/// Bucket holding the sync checkpoints
pub const DEFAULT_CHECKPOINT_BUCKET: &str = "solr.ucldc";

/// Region of [`DEFAULT_CHECKPOINT_BUCKET`]
pub const DEFAULT_S3_REGION: &str = "us-west-2";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    /// Custom endpoint (MinIO, localstack); `None` targets AWS
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    /// Static credentials; the default AWS provider chain is used when absent
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: DEFAULT_S3_REGION.to_string(),
            bucket: DEFAULT_CHECKPOINT_BUCKET.to_string(),
            access_key: None,
            secret_key: None,
            path_style: false,
        }
    }
}

impl S3Config {
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var("S3_ENDPOINT").ok().filter(|e| !e.is_empty()),
            region: env::var("S3_REGION").unwrap_or_else(|_| DEFAULT_S3_REGION.to_string()),
            bucket: env::var("CHECKPOINT_BUCKET")
                .unwrap_or_else(|_| DEFAULT_CHECKPOINT_BUCKET.to_string()),
            access_key: env::var("S3_ACCESS_KEY")
                .or_else(|_| env::var("AWS_ACCESS_KEY_ID"))
                .ok(),
            secret_key: env::var("S3_SECRET_KEY")
                .or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"))
                .ok(),
            path_style: env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }

    /// Local S3-compatible server with path-style addressing
    pub fn for_endpoint(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            bucket: bucket.into(),
            path_style: true,
            ..Self::default()
        }
    }
}

#[derive(Clone)]
pub struct S3Backend {
    client: Client,
    bucket: String,
}

impl S3Backend {
    pub async fn new(config: S3Config) -> Result<Self> {
        debug!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint,
            "Initializing checkpoint bucket client"
        );

        let region = Region::new(config.region.clone());
        let mut builder = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials =
                    Credentials::new(access_key, secret_key, None, None, "harvest-checkpoint");
                aws_sdk_s3::Config::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .credentials_provider(credentials)
                    .region(region)
            },
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            },
        };
        builder = builder.force_path_style(config.path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());
        info!(bucket = %config.bucket, "Checkpoint bucket client initialized");

        Ok(Self {
            client,
            bucket: config.bucket,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl CheckpointBackend for S3Backend {
    #[instrument(skip(self))]
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    debug!(bucket = %self.bucket, key, "Checkpoint object not found");
                    return Ok(None);
                }
                return Err(HarvestError::checkpoint(format!(
                    "failed to read s3://{}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&err)
                )));
            },
        };

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| HarvestError::checkpoint(format!("failed to read checkpoint body: {}", e)))?
            .into_bytes()
            .to_vec();

        debug!(bytes = data.len(), "Downloaded s3://{}/{}", self.bucket, key);
        Ok(Some(data))
    }

    #[instrument(skip(self, bytes))]
    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("text/plain")
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|err| {
                HarvestError::checkpoint(format!(
                    "failed to write s3://{}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&err)
                ))
            })?;

        info!("Uploaded s3://{}/{}", self.bucket, key);
        Ok(())
    }
}
