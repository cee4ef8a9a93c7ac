//! In-memory object source, for tests and for serving prebuilt stores.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;
use crate::io::RangeReader;

use super::ObjectSource;

/// Objects held in a shared map. Cloning shares the map and the counters.
#[derive(Clone, Default)]
pub struct MemoryObjectSource {
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
    readers_created: Arc<AtomicUsize>,
    range_reads: Arc<AtomicUsize>,
}

impl MemoryObjectSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) an object.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        if let Ok(mut objects) = self.objects.write() {
            objects.insert(key.into(), data.into());
        }
    }

    pub fn remove(&self, key: &str) {
        if let Ok(mut objects) = self.objects.write() {
            objects.remove(key);
        }
    }

    /// Number of readers created so far.
    pub fn readers_created(&self) -> usize {
        self.readers_created.load(Ordering::SeqCst)
    }

    /// Number of range reads issued through readers of this source.
    pub fn range_reads(&self) -> usize {
        self.range_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectSource for MemoryObjectSource {
    type Reader = MemoryReader;

    async fn create_reader(&self, key: &str) -> Result<Self::Reader, IoError> {
        let data = self
            .objects
            .read()
            .map_err(|_| IoError::Connection("object map poisoned".to_string()))?
            .get(key)
            .cloned()
            .ok_or_else(|| IoError::NotFound(format!("memory://{}", key)))?;

        self.readers_created.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryReader {
            data,
            identifier: format!("memory://{}", key),
            range_reads: self.range_reads.clone(),
        })
    }
}

/// Range reader over one in-memory object.
pub struct MemoryReader {
    data: Bytes,
    identifier: String,
    range_reads: Arc<AtomicUsize>,
}

#[async_trait]
impl RangeReader for MemoryReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let end = offset + len as u64;
        if end > self.data.len() as u64 {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.data.len() as u64,
            });
        }
        self.range_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.data.slice(offset as usize..end as usize))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
