//! Client-side image list of one authoring session.

use thiserror::Error;
use uuid::Uuid;

use crate::models::{LocalFile, ProductImage, ProductRecord, StagedImage};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StagingError {
    #[error("image index {index} is out of range for {len} staged image(s)")]
    OutOfRange { index: usize, len: usize },
}

/// Ordered mix of pending local files and already-persisted images.
///
/// Keeps the storage paths that were present when the session was opened so
/// that the paths dropped since then can be handed to the repository for
/// deletion on save.
#[derive(Debug, Clone, Default)]
pub struct ImageStaging {
    entries: Vec<StagedImage>,
    loaded_paths: Vec<String>,
}

impl ImageStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Staging for an edit session: every stored image, in stored order.
    pub fn from_record(record: &ProductRecord) -> Self {
        Self {
            entries: record
                .images
                .iter()
                .cloned()
                .map(StagedImage::Persisted)
                .collect(),
            loaded_paths: record.images.iter().map(|image| image.path.clone()).collect(),
        }
    }

    /// Appends the files as pending entries; nothing is uploaded.
    pub fn add_files<I>(&mut self, files: I)
    where
        I: IntoIterator<Item = LocalFile>,
    {
        self.entries
            .extend(files.into_iter().map(|file| StagedImage::Pending {
                file,
                preview: new_preview_reference(),
            }));
    }

    /// Removes the entry at `index`; later entries shift down by one.
    pub fn remove_at(&mut self, index: usize) -> Result<StagedImage, StagingError> {
        if index >= self.entries.len() {
            return Err(StagingError::OutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        Ok(self.entries.remove(index))
    }

    pub fn entries(&self) -> &[StagedImage] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// What a view renders, in order.
    pub fn previews(&self) -> Vec<&str> {
        self.entries.iter().map(StagedImage::preview_url).collect()
    }

    /// Pending files still waiting for upload, in order.
    pub fn to_upload_set(&self) -> Vec<LocalFile> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                StagedImage::Pending { file, .. } => Some(file.clone()),
                StagedImage::Persisted(_) => None,
            })
            .collect()
    }

    /// Persisted images that are still part of the session, in order.
    pub fn retained(&self) -> Vec<&ProductImage> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                StagedImage::Persisted(image) => Some(image),
                StagedImage::Pending { .. } => None,
            })
            .collect()
    }

    /// Paths present when the session was opened that are gone now.
    pub fn to_delete_set(&self) -> Vec<String> {
        self.loaded_paths
            .iter()
            .filter(|path| {
                !self
                    .entries
                    .iter()
                    .any(|entry| entry.storage_path() == Some(path.as_str()))
            })
            .cloned()
            .collect()
    }

    /// Resets the session to the images of a freshly saved record.
    pub fn promote(&mut self, record: &ProductRecord) {
        *self = Self::from_record(record);
    }
}

fn new_preview_reference() -> String {
    format!("blob:{}", Uuid::new_v4())
}
