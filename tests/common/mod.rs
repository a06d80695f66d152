#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use argon2::Params;
use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use marketplace_api::{
    app_router,
    auth::InMemoryIdentityProvider,
    config::AppConfig,
    models::LocalFile,
    store::{
        BlobStore, DocumentStore, FieldFilter, InMemoryBlobStore, InMemoryDocumentStore,
        StoreError, StoredBlob,
    },
    AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const FILES_BASE_URL: &str = "http://127.0.0.1:18080/files";
pub const PASSWORD: &str = "correct-horse-42!";

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "test_secret_key_for_testing_purposes_only_and_long_enough_64chars".to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    cfg.cors_allow_any_origin = true;
    cfg
}

/// Identity provider with argon2 parameters cheap enough for tests.
pub fn fast_identity() -> InMemoryIdentityProvider {
    InMemoryIdentityProvider::with_params(Params::new(1024, 1, 1, None).expect("argon2 params"))
}

pub fn png(name: &str, bytes: &'static [u8]) -> LocalFile {
    LocalFile::new(name, "image/png", Bytes::from_static(bytes))
}

pub fn attachment(name: &str, bytes: &[u8]) -> Value {
    json!({
        "file_name": name,
        "content_type": "image/png",
        "data": STANDARD.encode(bytes),
    })
}

pub fn product_body(name: &str, images: Vec<Value>) -> Value {
    json!({
        "name": name,
        "price": 1200,
        "quantity": 3,
        "description": "Hand-made and lightly used",
        "category": "clothing",
        "images": images,
    })
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Blob store wrapper that fails selected uploads and deletes and records
/// every delete it is asked to perform.
pub struct FlakyBlobStore {
    pub inner: InMemoryBlobStore,
    fail_upload_bytes: Mutex<HashSet<Bytes>>,
    fail_delete_calls: Mutex<HashSet<usize>>,
    delete_count: AtomicUsize,
    pub deletes: Mutex<Vec<String>>,
}

impl FlakyBlobStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryBlobStore::new(FILES_BASE_URL),
            fail_upload_bytes: Mutex::new(HashSet::new()),
            fail_delete_calls: Mutex::new(HashSet::new()),
            delete_count: AtomicUsize::new(0),
            deletes: Mutex::new(Vec::new()),
        }
    }

    /// Any upload carrying exactly these bytes fails.
    pub fn fail_uploads_of(&self, bytes: &'static [u8]) {
        self.fail_upload_bytes
            .lock()
            .unwrap()
            .insert(Bytes::from_static(bytes));
    }

    /// The delete call with this zero-based index fails.
    pub fn fail_delete_call(&self, index: usize) {
        self.fail_delete_calls.lock().unwrap().insert(index);
    }

    pub fn delete_calls(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<String, StoreError> {
        if self.fail_upload_bytes.lock().unwrap().contains(&bytes) {
            return Err(StoreError::Backend("upload refused".into()));
        }
        self.inner.upload(path, bytes, content_type).await
    }

    async fn download_url(&self, storage_path: &str) -> Result<String, StoreError> {
        self.inner.download_url(storage_path).await
    }

    async fn fetch(&self, storage_path: &str) -> Result<Option<StoredBlob>, StoreError> {
        self.inner.fetch(storage_path).await
    }

    async fn delete(&self, storage_path: &str) -> Result<(), StoreError> {
        let call = self.delete_count.fetch_add(1, Ordering::SeqCst);
        self.deletes.lock().unwrap().push(storage_path.to_string());
        if self.fail_delete_calls.lock().unwrap().contains(&call) {
            return Err(StoreError::Backend("delete refused".into()));
        }
        self.inner.delete(storage_path).await
    }
}

/// Document store wrapper whose writes can be switched off.
pub struct FlakyDocumentStore {
    pub inner: InMemoryDocumentStore,
    fail_writes: AtomicBool,
}

impl FlakyDocumentStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryDocumentStore::new(),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("write refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FlakyDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        self.inner.get(collection, id).await
    }

    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        self.check_write()?;
        self.inner.set(collection, id, doc).await
    }

    async fn update(&self, collection: &str, id: &str, partial: Value) -> Result<(), StoreError> {
        self.check_write()?;
        self.inner.update(collection, id, partial).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.check_write()?;
        self.inner.delete(collection, id).await
    }

    async fn query(
        &self,
        collection: &str,
        filter: &FieldFilter,
    ) -> Result<Vec<Value>, StoreError> {
        self.inner.query(collection, filter).await
    }
}

/// Helper harness running the full router over in-memory backends.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub blobs: Arc<FlakyBlobStore>,
}

impl TestApp {
    pub fn new() -> Self {
        let blobs = Arc::new(FlakyBlobStore::new());
        let state = AppState::new(
            test_config(),
            Arc::new(fast_identity()),
            Arc::new(InMemoryDocumentStore::new()),
            blobs.clone(),
        );

        Self {
            router: app_router(state.clone()),
            state,
            blobs,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    /// Registers an account and logs it in; returns the access token and profile.
    pub async fn sign_up_and_login(&self, email: &str, is_seller: bool) -> (String, Value) {
        let response = self
            .request(
                Method::POST,
                "/api/v1/auth/signup",
                Some(json!({
                    "email": email,
                    "nickname": "tester",
                    "password": PASSWORD,
                    "check_password": PASSWORD,
                    "is_seller": is_seller,
                })),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED, "signup failed");

        let response = self
            .request(
                Method::POST,
                "/api/v1/auth/login",
                Some(json!({ "email": email, "password": PASSWORD })),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login failed");

        let body = response_json(response).await;
        let token = body["access_token"]
            .as_str()
            .expect("access token")
            .to_string();
        (token, body["profile"].clone())
    }
}
