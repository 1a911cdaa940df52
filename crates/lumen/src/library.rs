//! JSON-file library index.
//!
//! Image records, tags, and image-tag links live in a single
//! `library.json` under the media root. Every mutation rewrites the file,
//! which is fine at personal-library scale and keeps the index greppable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use lumen_core::{ImageRecord, ImageStore, StoreError, StoredTag, TagSource, TagStore};

pub const INDEX_FILE: &str = "library.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct LibraryData {
    next_image_id: u64,
    next_tag_id: u64,
    records: Vec<ImageRecord>,
    tags: Vec<StoredTag>,
    /// image id -> associated tag ids, in association order
    links: HashMap<u64, Vec<u64>>,
}

/// The on-disk library index, implementing the core store traits.
pub struct JsonLibrary {
    path: PathBuf,
    state: Mutex<LibraryData>,
}

impl JsonLibrary {
    /// Open the index under the media root, starting empty if absent.
    pub fn open(media_root: &Path) -> Result<Self, StoreError> {
        let path = media_root.join(INDEX_FILE);
        let data = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            LibraryData::default()
        };
        Ok(Self {
            path,
            state: Mutex::new(data),
        })
    }

    fn save(&self, data: &LibraryData) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(data)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Path of the index file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TagStore for JsonLibrary {
    async fn get_or_create(
        &self,
        name: &str,
        default_source: TagSource,
    ) -> Result<StoredTag, StoreError> {
        let mut data = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tag) = data.tags.iter().find(|t| t.name == name) {
            return Ok(tag.clone());
        }
        data.next_tag_id += 1;
        let tag = StoredTag {
            id: data.next_tag_id,
            name: name.to_string(),
            source: default_source,
        };
        data.tags.push(tag.clone());
        self.save(&data)?;
        Ok(tag)
    }

    async fn associate(&self, image_id: u64, tag_id: u64) -> Result<(), StoreError> {
        let mut data = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let links = data.links.entry(image_id).or_default();
        if !links.contains(&tag_id) {
            links.push(tag_id);
            self.save(&data)?;
        }
        Ok(())
    }

    async fn tags_for(&self, image_id: u64) -> Result<Vec<StoredTag>, StoreError> {
        let data = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let ids = data.links.get(&image_id).cloned().unwrap_or_default();
        Ok(ids
            .into_iter()
            .filter_map(|id| data.tags.iter().find(|t| t.id == id).cloned())
            .collect())
    }
}

#[async_trait]
impl ImageStore for JsonLibrary {
    async fn create(&self, record: &ImageRecord) -> Result<u64, StoreError> {
        let mut data = self.state.lock().unwrap_or_else(|e| e.into_inner());
        data.next_image_id += 1;
        let id = data.next_image_id;
        let mut stored = record.clone();
        stored.id = id;
        data.records.push(stored);
        self.save(&data)?;
        Ok(id)
    }

    async fn update(&self, record: &ImageRecord) -> Result<(), StoreError> {
        let mut data = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(slot) = data.records.iter_mut().find(|r| r.id == record.id) else {
            return Err(StoreError::NotFound(format!("image {}", record.id)));
        };
        *slot = record.clone();
        self.save(&data)?;
        Ok(())
    }

    async fn get(&self, id: u64) -> Result<ImageRecord, StoreError> {
        let data = self.state.lock().unwrap_or_else(|e| e.into_inner());
        data.records
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("image {id}")))
    }

    async fn list(&self) -> Result<Vec<ImageRecord>, StoreError> {
        let data = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut records = data.records.clone();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }
}
