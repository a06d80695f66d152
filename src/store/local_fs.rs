use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::{debug, instrument};

use super::{check_storage_path, public_url, BlobStore, StoreError, StoredBlob};

const DATA_DIR: &str = "data";
const META_DIR: &str = "meta";

/// Blob store on the local disk.
///
/// Blob bytes live under `<root>/data/<path>` and the uploaded content type
/// under `<root>/meta/<path>`.
#[derive(Debug, Clone)]
pub struct LocalFsBlobStore {
    root: PathBuf,
    base_url: String,
}

impl LocalFsBlobStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locate(&self, dir: &str, storage_path: &str) -> Result<PathBuf, StoreError> {
        check_storage_path(storage_path)?;
        let mut location = self.root.join(dir);
        location.extend(storage_path.split('/'));
        Ok(location)
    }
}

async fn write_file(location: &Path, contents: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = location.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(location, contents).await?;
    Ok(())
}

async fn remove_if_present(location: &Path) -> Result<(), StoreError> {
    match fs::remove_file(location).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl BlobStore for LocalFsBlobStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<String, StoreError> {
        let data = self.locate(DATA_DIR, path)?;
        let meta = self.locate(META_DIR, path)?;

        write_file(&data, &bytes).await?;
        write_file(&meta, content_type.as_bytes()).await?;
        debug!(location = %data.display(), "blob written");
        Ok(path.to_string())
    }

    async fn download_url(&self, storage_path: &str) -> Result<String, StoreError> {
        check_storage_path(storage_path)?;
        Ok(public_url(&self.base_url, storage_path))
    }

    async fn fetch(&self, storage_path: &str) -> Result<Option<StoredBlob>, StoreError> {
        let data = self.locate(DATA_DIR, storage_path)?;
        let bytes = match fs::read(&data).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let content_type = match fs::read_to_string(self.locate(META_DIR, storage_path)?).await {
            Ok(content_type) => content_type,
            Err(err) if err.kind() == ErrorKind::NotFound => "application/octet-stream".into(),
            Err(err) => return Err(err.into()),
        };

        Ok(Some(StoredBlob {
            bytes: Bytes::from(bytes),
            content_type,
        }))
    }

    #[instrument(skip(self))]
    async fn delete(&self, storage_path: &str) -> Result<(), StoreError> {
        remove_if_present(&self.locate(DATA_DIR, storage_path)?).await?;
        remove_if_present(&self.locate(META_DIR, storage_path)?).await
    }
}
