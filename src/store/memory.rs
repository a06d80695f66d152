use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use serde_json::Value;

use super::{
    check_storage_path, merge_fields, public_url, BlobStore, DocumentStore, FieldFilter,
    StoreError, StoredBlob,
};

/// Document store kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    docs: DashMap<(String, String), Value>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

fn key(collection: &str, id: &str) -> (String, String) {
    (collection.to_string(), id.to_string())
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.docs.get(&key(collection, id)).map(|doc| doc.clone()))
    }

    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        self.docs.insert(key(collection, id), doc);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, partial: Value) -> Result<(), StoreError> {
        let mut doc = self
            .docs
            .get_mut(&key(collection, id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        merge_fields(collection, id, doc.value_mut(), partial)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.docs.remove(&key(collection, id));
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filter: &FieldFilter,
    ) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .docs
            .iter()
            .filter(|entry| entry.key().0 == collection && filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect())
    }
}

/// Blob store kept in process memory; URLs point under `base_url`.
#[derive(Debug)]
pub struct InMemoryBlobStore {
    base_url: String,
    blobs: DashMap<String, StoredBlob>,
}

impl InMemoryBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            blobs: DashMap::new(),
        }
    }

    pub fn contains(&self, storage_path: &str) -> bool {
        self.blobs.contains_key(storage_path)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<String, StoreError> {
        check_storage_path(path)?;
        self.blobs.insert(
            path.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(path.to_string())
    }

    async fn download_url(&self, storage_path: &str) -> Result<String, StoreError> {
        check_storage_path(storage_path)?;
        Ok(public_url(&self.base_url, storage_path))
    }

    async fn fetch(&self, storage_path: &str) -> Result<Option<StoredBlob>, StoreError> {
        Ok(self.blobs.get(storage_path).map(|blob| blob.clone()))
    }

    async fn delete(&self, storage_path: &str) -> Result<(), StoreError> {
        self.blobs.remove(storage_path);
        Ok(())
    }
}
