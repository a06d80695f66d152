use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A file picked by the seller that has not been uploaded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl LocalFile {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_image(&self) -> bool {
        self.content_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

/// An uploaded image: the display URL and the durable blob-store key behind it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductImage {
    pub url: String,
    pub path: String,
}

impl ProductImage {
    pub fn new(url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
        }
    }
}

/// One entry of an editing session's image list.
///
/// A pending entry only exists on the client side and carries a transient
/// preview reference; a persisted entry points at a blob uploaded by an
/// earlier save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedImage {
    Pending { file: LocalFile, preview: String },
    Persisted(ProductImage),
}

impl StagedImage {
    /// Reference a view can render: the local preview or the durable URL.
    pub fn preview_url(&self) -> &str {
        match self {
            StagedImage::Pending { preview, .. } => preview,
            StagedImage::Persisted(image) => &image.url,
        }
    }

    pub fn storage_path(&self) -> Option<&str> {
        match self {
            StagedImage::Pending { .. } => None,
            StagedImage::Persisted(image) => Some(&image.path),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, StagedImage::Pending { .. })
    }
}
