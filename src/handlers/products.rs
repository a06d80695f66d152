use std::collections::HashSet;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::common::{
    created_response, decode_attachments, json_body, no_content_response, success_response,
    ImageAttachment,
};
use crate::auth::AuthUser;
use crate::errors::{ApiError, ServiceError};
use crate::models::{Category, ProductImage, ProductRecord};
use crate::repositories::SaveReport;
use crate::services::AuthoringSession;
use crate::validation::ProductForm;
use crate::AppState;

/// Product listing as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductResponse {
    pub id: String,
    pub seller_id: String,
    pub name: String,
    pub price: i64,
    pub quantity: i64,
    pub description: String,
    pub category: Category,
    pub images: Vec<ProductImage>,
}

impl From<ProductRecord> for ProductResponse {
    fn from(record: ProductRecord) -> Self {
        Self {
            id: record.id,
            seller_id: record.seller_id,
            name: record.name,
            price: record.price,
            quantity: record.quantity,
            description: record.description,
            category: record.category,
            images: record.images,
        }
    }
}

/// A saved listing plus the storage paths of removed images whose blobs
/// could not be deleted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedProductResponse {
    #[serde(flatten)]
    pub product: ProductResponse,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub undeleted_images: Vec<String>,
}

impl From<SaveReport> for SavedProductResponse {
    fn from(report: SaveReport) -> Self {
        Self {
            product: report.record.into(),
            undeleted_images: report.failed_deletes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    #[serde(flatten)]
    pub form: ProductForm,
    #[serde(default)]
    pub images: Vec<ImageAttachment>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    #[serde(flatten)]
    pub form: ProductForm,
    /// Storage paths of the current images to keep; omitted keeps them all
    #[serde(default)]
    pub retained_paths: Option<Vec<String>>,
    /// New images, appended after the retained ones
    #[serde(default)]
    pub images: Vec<ImageAttachment>,
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let record = state.products.read(&id).await?;
    Ok(success_response(ProductResponse::from(record)))
}

async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let seller = user.require_seller()?;
    let request = json_body(payload)?;
    let files = decode_attachments(request.images)?;

    let mut session = AuthoringSession::create(state.products.clone(), seller);
    session.add_files(files);
    let report = session.submit(request.form).await.into_result()?;

    info!(product_id = %report.record.id, "Product created");
    Ok(created_response(SavedProductResponse::from(report)))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: AuthUser,
    payload: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let seller = user.require_seller()?;
    let request = json_body(payload)?;
    let files = decode_attachments(request.images)?;

    let mut session = AuthoringSession::edit(state.products.clone(), seller, &id).await?;

    if let Some(retained) = request.retained_paths {
        let retained: HashSet<String> = retained.into_iter().collect();
        let dropped: Vec<usize> = session
            .images()
            .iter()
            .enumerate()
            .filter(|(_, image)| {
                image
                    .storage_path()
                    .is_some_and(|path| !retained.contains(path))
            })
            .map(|(index, _)| index)
            .collect();
        // Back to front so earlier indices stay valid.
        for index in dropped.into_iter().rev() {
            session.remove_image(index)?;
        }
    }

    session.add_files(files);
    let report = session.submit(request.form).await.into_result()?;

    if report.failed_deletes.is_empty() {
        info!(product_id = %report.record.id, "Product updated");
    } else {
        warn!(
            product_id = %report.record.id,
            paths = ?report.failed_deletes,
            "Product updated with undeleted image blobs"
        );
    }
    Ok(success_response(SavedProductResponse::from(report)))
}

async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let seller = user.require_seller()?;
    state.products.delete(&seller, &id).await?;

    info!(product_id = %id, "Product deleted");
    Ok(no_content_response())
}

async fn my_products(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let seller = user.require_seller()?;
    let records = state.products.list_by_seller(&seller.seller_id).await?;
    let products: Vec<ProductResponse> = records.into_iter().map(Into::into).collect();
    Ok(success_response(products))
}

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(create_product))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/me/products", get(my_products))
}
