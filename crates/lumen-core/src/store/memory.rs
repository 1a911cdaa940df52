//! In-memory store implementations backed by `Mutex<HashMap>`.
//!
//! Used by tests and by callers that want pipeline behavior without a
//! persistent library. Each mutation takes the lock once, so trait calls
//! are atomic with respect to each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{ImageRecord, StoredTag, TagSource};

use super::{BlobStore, ImageStore, TagStore};

#[derive(Default)]
struct TagState {
    by_name: HashMap<String, StoredTag>,
    /// image id -> associated tag ids, in association order
    links: HashMap<u64, Vec<u64>>,
    next_id: u64,
}

/// Tag store holding everything in memory.
#[derive(Default)]
pub struct MemoryTagStore {
    state: Mutex<TagState>,
}

impl MemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct tags, for tests.
    pub fn tag_count(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).by_name.len()
    }

    /// Number of stored associations for an image, for tests.
    pub fn link_count(&self, image_id: u64) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .links
            .get(&image_id)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl TagStore for MemoryTagStore {
    async fn get_or_create(
        &self,
        name: &str,
        default_source: TagSource,
    ) -> Result<StoredTag, StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tag) = state.by_name.get(name) {
            return Ok(tag.clone());
        }
        state.next_id += 1;
        let tag = StoredTag {
            id: state.next_id,
            name: name.to_string(),
            source: default_source,
        };
        state.by_name.insert(name.to_string(), tag.clone());
        Ok(tag)
    }

    async fn associate(&self, image_id: u64, tag_id: u64) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let links = state.links.entry(image_id).or_default();
        if !links.contains(&tag_id) {
            links.push(tag_id);
        }
        Ok(())
    }

    async fn tags_for(&self, image_id: u64) -> Result<Vec<StoredTag>, StoreError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let ids = state.links.get(&image_id).cloned().unwrap_or_default();
        let mut tags = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(tag) = state.by_name.values().find(|t| t.id == id) {
                tags.push(tag.clone());
            }
        }
        Ok(tags)
    }
}

/// Blob store holding bytes in memory, with a write counter for tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    writes: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total successful writes since construction.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), bytes.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
            .is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key))
    }
}

#[derive(Default)]
struct ImageState {
    records: HashMap<u64, ImageRecord>,
    next_id: u64,
}

/// Image record store holding everything in memory.
#[derive(Default)]
pub struct MemoryImageStore {
    state: Mutex<ImageState>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn create(&self, record: &ImageRecord) -> Result<u64, StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.next_id += 1;
        let id = state.next_id;
        let mut stored = record.clone();
        stored.id = id;
        state.records.insert(id, stored);
        Ok(id)
    }

    async fn update(&self, record: &ImageRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.records.contains_key(&record.id) {
            return Err(StoreError::NotFound(format!("image {}", record.id)));
        }
        state.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: u64) -> Result<ImageRecord, StoreError> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("image {id}")))
    }

    async fn list(&self) -> Result<Vec<ImageRecord>, StoreError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut records: Vec<_> = state.records.values().cloned().collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }
}
