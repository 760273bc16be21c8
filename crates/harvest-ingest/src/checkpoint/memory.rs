//! In-process checkpoint storage for tests and dry runs

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::CheckpointBackend;
use crate::error::{HarvestError, Result};

/// Clones share the same objects
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CheckpointBackend for MemoryBackend {
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| HarvestError::checkpoint("memory backend poisoned"))?;
        Ok(objects.get(key).cloned())
    }

    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| HarvestError::checkpoint("memory backend poisoned"))?;
        objects.insert(key.to_string(), bytes);
        Ok(())
    }
}
