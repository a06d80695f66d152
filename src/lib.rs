//! Marketplace API Library
//!
//! Seller accounts and a product-authoring workflow with multi-image
//! attachment, served over HTTP.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod models;
pub mod repositories;
pub mod services;
pub mod staging;
pub mod store;
pub mod tracing;
pub mod validation;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};

use crate::auth::{AuthService, IdentityProvider, InMemoryIdentityProvider};
use crate::config::AppConfig;
use crate::repositories::{ProductRepository, StoreProductRepository, UserRepository};
use crate::services::AccountService;
use crate::store::{
    BlobStore, DocumentStore, InMemoryBlobStore, InMemoryDocumentStore, LocalFsBlobStore,
    SqlDocumentStore, StoreError,
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
    pub accounts: Arc<AccountService>,
    pub products: Arc<dyn ProductRepository>,
    pub docs: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
}

impl AppState {
    /// Wires services over the given identity provider and stores.
    pub fn new(
        config: AppConfig,
        identity: Arc<dyn IdentityProvider>,
        docs: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        let auth = AuthService::new(config.auth_config());
        let accounts = AccountService::new(identity, UserRepository::new(docs.clone()));
        let products =
            StoreProductRepository::with_limits(docs.clone(), blobs.clone(), config.upload_limits());

        Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
            accounts: Arc::new(accounts),
            products: Arc::new(products),
            docs,
            blobs,
        }
    }

    /// Picks the document and blob backends named by the configuration.
    pub async fn from_config(config: AppConfig) -> Result<Self, StoreError> {
        let docs: Arc<dyn DocumentStore> = if config.uses_sql_documents() {
            let db = db::establish_connection_from_app_config(&config).await?;
            Arc::new(SqlDocumentStore::new(db))
        } else {
            Arc::new(InMemoryDocumentStore::new())
        };

        let blobs: Arc<dyn BlobStore> = if config.uses_local_blobs() {
            Arc::new(LocalFsBlobStore::new(
                config.blob_root.clone(),
                config.files_base_url(),
            ))
        } else {
            Arc::new(InMemoryBlobStore::new(config.files_base_url()))
        };

        Ok(Self::new(
            config,
            Arc::new(InMemoryIdentityProvider::new()),
            docs,
            blobs,
        ))
    }
}

// Common response wrappers
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            meta: Some(ResponseMeta::capture()),
        }
    }
}


pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", handlers::auth_routes())
        .merge(handlers::product_routes())
}

/// Full application router without CORS.
pub fn app_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_size;

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1_routes())
        .merge(handlers::file_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

/// CORS policy from configuration; `None` when nothing allows any origin.
pub fn cors_layer(cfg: &AppConfig) -> Option<CorsLayer> {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        Some(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        Some(CorsLayer::permissive())
    } else {
        None
    }
}

async fn health_check(State(state): State<AppState>) -> Response {
    match state.docs.get("health", "probe").await {
        Ok(_) => Json(ApiResponse::success(json!({
            "status": "healthy",
            "document_store": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "environment": state.config.environment,
        })))
        .into_response(),
        Err(e) => {
            ::tracing::warn!("Health probe failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::<()>::error(
                    "document store is unreachable".to_string(),
                )),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod cors_tests {
    use super::*;

    fn config(environment: &str) -> AppConfig {
        AppConfig::new(
            "x".repeat(64),
            "127.0.0.1".into(),
            8080,
            environment.into(),
        )
    }

    #[test]
    fn production_without_origins_has_no_policy() {
        assert!(cors_layer(&config("production")).is_none());
    }

    #[test]
    fn explicit_origins_or_development_produce_a_policy() {
        let mut cfg = config("production");
        cfg.cors_allowed_origins = Some("https://shop.example.com, ".into());
        assert!(cors_layer(&cfg).is_some());
        assert!(cors_layer(&config("development")).is_some());
    }
}
