/*!
 * # Store Ports
 *
 * Interfaces of the external collaborators that hold all persistent state:
 *
 * - [`DocumentStore`]: JSON documents grouped in collections, keyed by id
 * - [`BlobStore`]: binary objects addressed by a storage path, each with a
 *   display URL
 *
 * Backends live in the submodules: in-memory ones for tests and local runs,
 * a SQL document store on sea-orm and a local-disk blob store.
 */

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

pub mod document_entity;
pub mod local_fs;
pub mod memory;
pub mod sql;

pub use local_fs::LocalFsBlobStore;
pub use memory::{InMemoryBlobStore, InMemoryDocumentStore};
pub use sql::SqlDocumentStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("invalid storage path: {0}")]
    InvalidPath(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Equality filter on one top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: Value,
}

impl FieldFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, doc: &Value) -> bool {
        doc.get(&self.field) == Some(&self.value)
    }
}

/// A blob as stored, with the content type it was uploaded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Bytes,
    pub content_type: String,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Writes the whole document, replacing any previous one.
    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError>;

    /// Merges the top-level fields of `partial` into an existing document.
    async fn update(&self, collection: &str, id: &str, partial: Value) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    async fn query(&self, collection: &str, filter: &FieldFilter)
        -> Result<Vec<Value>, StoreError>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` at `path` and returns the durable storage path.
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<String, StoreError>;

    async fn download_url(&self, storage_path: &str) -> Result<String, StoreError>;

    async fn fetch(&self, storage_path: &str) -> Result<Option<StoredBlob>, StoreError>;

    /// Deleting a path that holds nothing succeeds.
    async fn delete(&self, storage_path: &str) -> Result<(), StoreError>;
}

/// Shallow merge used by backends that keep whole documents.
pub(crate) fn merge_fields(
    collection: &str,
    id: &str,
    target: &mut Value,
    partial: Value,
) -> Result<(), StoreError> {
    match (target, partial) {
        (Value::Object(existing), Value::Object(fields)) => {
            existing.extend(fields);
            Ok(())
        }
        _ => Err(StoreError::Backend(format!(
            "document {collection}/{id} and its update must both be objects"
        ))),
    }
}

/// Rejects storage paths that could escape a blob root or address nothing.
pub(crate) fn check_storage_path(path: &str) -> Result<(), StoreError> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Display URL of a blob under `base_url`.
pub(crate) fn public_url(base_url: &str, storage_path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), storage_path)
}
