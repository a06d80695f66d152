use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{
    LocalFile, ProductDraft, ProductImage, ProductRecord, SellerContext, PRODUCTS_COLLECTION,
};
use crate::models::product::SELLER_ID_FIELD;
use crate::store::{BlobStore, DocumentStore, FieldFilter, StoreError};
use crate::validation::{FieldViolation, Violations};

/// Attachment limits enforced before anything is uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_image_bytes: usize,
    pub max_images_per_product: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_image_bytes: 5 * 1024 * 1024,
            max_images_per_product: 10,
        }
    }
}

impl UploadLimits {
    fn check(&self, files: &[LocalFile], already_attached: usize) -> Result<(), ServiceError> {
        let mut violations = Violations::default();

        for file in files {
            if !file.is_image() {
                violations.push(FieldViolation::new(
                    "images",
                    format!("{} is not an image", file.name),
                ));
            } else if file.len() > self.max_image_bytes {
                violations.push(FieldViolation::new(
                    "images",
                    format!(
                        "{} exceeds the {} byte limit",
                        file.name, self.max_image_bytes
                    ),
                ));
            }
        }

        if already_attached + files.len() > self.max_images_per_product {
            violations.push(FieldViolation::new(
                "images",
                format!(
                    "A product can have at most {} images",
                    self.max_images_per_product
                ),
            ));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::ValidationFailure(violations))
        }
    }
}

/// Result of a successful save.
///
/// `failed_deletes` lists removed image paths whose blobs could not be
/// deleted; the record itself no longer references them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub record: ProductRecord,
    pub failed_deletes: Vec<String>,
}

/// Product records and the blobs their images live in.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Uploads `files`, possibly none, and writes the record once with their
    /// URLs and paths.
    async fn create(
        &self,
        record: ProductRecord,
        files: Vec<LocalFile>,
    ) -> Result<ProductRecord, ServiceError>;

    async fn read(&self, id: &str) -> Result<ProductRecord, ServiceError>;

    /// Replaces the editable fields and image lists of an owned record.
    async fn update(
        &self,
        seller: &SellerContext,
        id: &str,
        draft: ProductDraft,
        files: Vec<LocalFile>,
        paths_to_delete: Vec<String>,
    ) -> Result<SaveReport, ServiceError>;

    /// Deletes every image blob of an owned record, then the record.
    async fn delete(&self, seller: &SellerContext, id: &str) -> Result<(), ServiceError>;

    async fn list_by_seller(&self, seller_id: &str) -> Result<Vec<ProductRecord>, ServiceError>;
}

/// [`ProductRepository`] over a document store and a blob store.
#[derive(Clone)]
pub struct StoreProductRepository {
    docs: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    limits: UploadLimits,
}

impl StoreProductRepository {
    pub fn new(docs: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self::with_limits(docs, blobs, UploadLimits::default())
    }

    pub fn with_limits(
        docs: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        limits: UploadLimits,
    ) -> Self {
        Self {
            docs,
            blobs,
            limits,
        }
    }

    pub fn limits(&self) -> UploadLimits {
        self.limits
    }

    async fn upload_one(
        &self,
        seller_id: &str,
        product_id: &str,
        file: LocalFile,
    ) -> Result<ProductImage, StoreError> {
        let path = storage_path(seller_id, product_id);
        let stored = self
            .blobs
            .upload(&path, file.bytes, &file.content_type)
            .await?;

        match self.blobs.download_url(&stored).await {
            Ok(url) => Ok(ProductImage::new(url, stored)),
            Err(e) => {
                self.discard(&[stored]).await;
                Err(e)
            }
        }
    }

    /// Uploads the batch concurrently; results keep submission order.
    ///
    /// On any failure the uploads that did complete are deleted again.
    async fn upload_all(
        &self,
        seller_id: &str,
        product_id: &str,
        files: Vec<LocalFile>,
    ) -> Result<Vec<ProductImage>, ServiceError> {
        let results = join_all(
            files
                .into_iter()
                .map(|file| self.upload_one(seller_id, product_id, file)),
        )
        .await;

        let mut uploaded = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(image) => uploaded.push(image),
                Err(e) => {
                    error!(product_id, "Image upload failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            let paths: Vec<String> = uploaded.into_iter().map(|image| image.path).collect();
            self.discard(&paths).await;
            return Err(ServiceError::UploadFailure(e.to_string()));
        }

        Ok(uploaded)
    }

    /// Best-effort blob deletes; every path is attempted and the failed ones
    /// are returned.
    async fn discard(&self, paths: &[String]) -> Vec<String> {
        let results = join_all(paths.iter().map(|path| self.blobs.delete(path))).await;

        paths
            .iter()
            .zip(results)
            .filter_map(|(path, result)| match result {
                Ok(()) => None,
                Err(e) => {
                    warn!(path = %path, "Failed to delete image blob: {}", e);
                    Some(path.clone())
                }
            })
            .collect()
    }

    async fn read_owned(
        &self,
        seller: &SellerContext,
        id: &str,
    ) -> Result<ProductRecord, ServiceError> {
        let record = self.read(id).await?;
        if record.seller_id != seller.seller_id {
            warn!(product_id = id, seller_id = %seller.seller_id, "Product belongs to another seller");
            return Err(ServiceError::Forbidden(format!(
                "product {id} belongs to another seller"
            )));
        }
        Ok(record)
    }
}

fn storage_path(seller_id: &str, product_id: &str) -> String {
    format!("{}/{}-{}", seller_id, product_id, Uuid::new_v4().simple())
}

fn parse_record(id: &str, doc: serde_json::Value) -> Result<ProductRecord, ServiceError> {
    serde_json::from_value(doc)
        .map_err(|e| ServiceError::InternalError(format!("corrupt product {id}: {e}")))
}

#[async_trait]
impl ProductRepository for StoreProductRepository {
    #[instrument(skip(self, record, files), fields(product_id = %record.id, seller_id = %record.seller_id, files = files.len()))]
    async fn create(
        &self,
        mut record: ProductRecord,
        files: Vec<LocalFile>,
    ) -> Result<ProductRecord, ServiceError> {
        self.limits.check(&files, 0)?;

        record.images = self.upload_all(&record.seller_id, &record.id, files).await?;

        let doc = serde_json::to_value(&record)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;
        if let Err(e) = self.docs.set(PRODUCTS_COLLECTION, &record.id, doc).await {
            error!("Failed to write product record: {}", e);
            let paths: Vec<String> = record.images.iter().map(|i| i.path.clone()).collect();
            self.discard(&paths).await;
            return Err(ServiceError::PersistFailure(e.to_string()));
        }

        info!(images = record.images.len(), "Product created");
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn read(&self, id: &str) -> Result<ProductRecord, ServiceError> {
        let doc = self
            .docs
            .get(PRODUCTS_COLLECTION, id)
            .await
            .map_err(|e| {
                error!("Failed to read product: {}", e);
                ServiceError::ExternalServiceError(e.to_string())
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {id}")))?;

        parse_record(id, doc)
    }

    #[instrument(skip(self, draft, files, paths_to_delete), fields(seller_id = %seller.seller_id, files = files.len()))]
    async fn update(
        &self,
        seller: &SellerContext,
        id: &str,
        draft: ProductDraft,
        files: Vec<LocalFile>,
        paths_to_delete: Vec<String>,
    ) -> Result<SaveReport, ServiceError> {
        let mut record = self.read_owned(seller, id).await?;

        let (owned, foreign): (Vec<String>, Vec<String>) = paths_to_delete
            .into_iter()
            .partition(|path| record.owns_path(path));
        if !foreign.is_empty() {
            warn!(paths = ?foreign, "Ignoring delete of paths the product does not own");
        }

        let retained: Vec<ProductImage> = record
            .images
            .iter()
            .filter(|image| !owned.contains(&image.path))
            .cloned()
            .collect();
        if retained.is_empty() && files.is_empty() {
            return Err(ServiceError::NoImageSelected);
        }
        self.limits.check(&files, retained.len())?;

        let failed_deletes = self.discard(&owned).await;
        let uploaded = self.upload_all(&record.seller_id, id, files).await?;
        let new_paths: Vec<String> = uploaded.iter().map(|i| i.path.clone()).collect();

        record.apply_draft(draft);
        record.images = retained.into_iter().chain(uploaded).collect();

        let partial = record
            .editable_fields()
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;
        if let Err(e) = self.docs.update(PRODUCTS_COLLECTION, id, partial).await {
            error!("Failed to update product record: {}", e);
            self.discard(&new_paths).await;
            return Err(match e {
                StoreError::NotFound { .. } => ServiceError::NotFound(format!("Product {id}")),
                other => ServiceError::PersistFailure(other.to_string()),
            });
        }

        info!(
            images = record.images.len(),
            removed = owned.len(),
            failed_deletes = failed_deletes.len(),
            "Product updated"
        );
        Ok(SaveReport {
            record,
            failed_deletes,
        })
    }

    #[instrument(skip(self), fields(seller_id = %seller.seller_id))]
    async fn delete(&self, seller: &SellerContext, id: &str) -> Result<(), ServiceError> {
        let record = self.read_owned(seller, id).await?;

        let paths: Vec<String> = record.images.iter().map(|i| i.path.clone()).collect();
        let failed = self.discard(&paths).await;

        self.docs
            .delete(PRODUCTS_COLLECTION, id)
            .await
            .map_err(|e| {
                error!("Failed to delete product record: {}", e);
                ServiceError::PersistFailure(e.to_string())
            })?;

        if !failed.is_empty() {
            return Err(ServiceError::DeleteFailure { paths: failed });
        }

        info!(images = paths.len(), "Product deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_by_seller(&self, seller_id: &str) -> Result<Vec<ProductRecord>, ServiceError> {
        let docs = self
            .docs
            .query(PRODUCTS_COLLECTION, &FieldFilter::eq(SELLER_ID_FIELD, seller_id))
            .await
            .map_err(|e| {
                error!("Failed to list products: {}", e);
                ServiceError::ExternalServiceError(e.to_string())
            })?;

        Ok(docs
            .into_iter()
            .filter_map(|doc| match serde_json::from_value::<ProductRecord>(doc) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping malformed product document: {}", e);
                    None
                }
            })
            .collect())
    }
}
