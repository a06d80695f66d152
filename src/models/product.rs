use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use super::image::ProductImage;

/// Document collection holding product records.
pub const PRODUCTS_COLLECTION: &str = "products";

/// Document field holding the owning seller identifier.
pub const SELLER_ID_FIELD: &str = "sellerId";

/// Fixed set of product categories a listing can be filed under.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    Food,
    Electronics,
    Clothing,
}

/// Validated editable fields of a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub name: String,
    pub price: i64,
    pub quantity: i64,
    pub description: String,
    pub category: Category,
}

/// A persisted product listing.
///
/// Stored as a document with parallel URL and path lists; the in-memory form
/// pairs them up so the two lists can never drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProductDocument", into = "ProductDocument")]
pub struct ProductRecord {
    pub id: String,
    pub seller_id: String,
    pub name: String,
    pub price: i64,
    pub quantity: i64,
    pub description: String,
    pub category: Category,
    pub images: Vec<ProductImage>,
}

impl ProductRecord {
    /// A record with no images yet.
    pub fn new(id: impl Into<String>, seller_id: impl Into<String>, draft: ProductDraft) -> Self {
        let mut record = Self {
            id: id.into(),
            seller_id: seller_id.into(),
            name: String::new(),
            price: 0,
            quantity: 0,
            description: String::new(),
            category: draft.category,
            images: Vec::new(),
        };
        record.apply_draft(draft);
        record
    }

    /// Replaces the editable fields; identifier and owner stay untouched.
    pub fn apply_draft(&mut self, draft: ProductDraft) {
        self.name = draft.name;
        self.price = draft.price;
        self.quantity = draft.quantity;
        self.description = draft.description;
        self.category = draft.category;
    }

    pub fn draft(&self) -> ProductDraft {
        ProductDraft {
            name: self.name.clone(),
            price: self.price,
            quantity: self.quantity,
            description: self.description.clone(),
            category: self.category,
        }
    }

    pub fn image_urls(&self) -> Vec<&str> {
        self.images.iter().map(|image| image.url.as_str()).collect()
    }

    pub fn image_paths(&self) -> Vec<&str> {
        self.images.iter().map(|image| image.path.as_str()).collect()
    }

    pub fn owns_path(&self, path: &str) -> bool {
        self.images.iter().any(|image| image.path == path)
    }

    /// Partial document covering every field an edit may change.
    pub fn editable_fields(&self) -> Result<Value, serde_json::Error> {
        let mut doc = serde_json::to_value(ProductDocument::from(self.clone()))?;
        if let Value::Object(fields) = &mut doc {
            fields.remove(SELLER_ID_FIELD);
            fields.remove("productId");
        }
        Ok(doc)
    }
}

/// Stored shape of a product record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductDocument {
    seller_id: String,
    product_id: String,
    product_name: String,
    product_price: i64,
    product_quantity: i64,
    product_description: String,
    product_category: Category,
    #[serde(default)]
    product_image_urls: Vec<String>,
    #[serde(default)]
    product_image_paths: Vec<String>,
}

impl TryFrom<ProductDocument> for ProductRecord {
    type Error = String;

    fn try_from(doc: ProductDocument) -> Result<Self, Self::Error> {
        if doc.product_image_urls.len() != doc.product_image_paths.len() {
            return Err(format!(
                "product {} has {} image urls but {} image paths",
                doc.product_id,
                doc.product_image_urls.len(),
                doc.product_image_paths.len()
            ));
        }

        let images = doc
            .product_image_urls
            .into_iter()
            .zip(doc.product_image_paths)
            .map(|(url, path)| ProductImage { url, path })
            .collect();

        Ok(Self {
            id: doc.product_id,
            seller_id: doc.seller_id,
            name: doc.product_name,
            price: doc.product_price,
            quantity: doc.product_quantity,
            description: doc.product_description,
            category: doc.product_category,
            images,
        })
    }
}

impl From<ProductRecord> for ProductDocument {
    fn from(record: ProductRecord) -> Self {
        let (product_image_urls, product_image_paths) = record
            .images
            .into_iter()
            .map(|image| (image.url, image.path))
            .unzip();

        Self {
            seller_id: record.seller_id,
            product_id: record.id,
            product_name: record.name,
            product_price: record.price,
            product_quantity: record.quantity,
            product_description: record.description,
            product_category: record.category,
            product_image_urls,
            product_image_paths,
        }
    }
}
