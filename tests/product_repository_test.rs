//! Integration tests for the store-backed product repository.
//!
//! Tests cover:
//! - Image ordering across create and edit
//! - Blob cleanup when uploads or the record write fail
//! - Delete continuing past individual blob failures

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use common::{png, FlakyBlobStore, FlakyDocumentStore};
use marketplace_api::errors::ServiceError;
use marketplace_api::models::{Category, ProductDraft, ProductRecord, SellerContext};
use marketplace_api::repositories::{ProductRepository, StoreProductRepository};
use marketplace_api::store::{BlobStore, DocumentStore};

const SELLER: &str = "seller-1";

fn draft(name: &str) -> ProductDraft {
    ProductDraft {
        name: name.to_string(),
        price: 2500,
        quantity: 2,
        description: "Barely worn".to_string(),
        category: Category::Clothing,
    }
}

fn seller() -> SellerContext {
    SellerContext::new(SELLER)
}

struct Fixture {
    repo: StoreProductRepository,
    docs: Arc<FlakyDocumentStore>,
    blobs: Arc<FlakyBlobStore>,
}

fn fixture() -> Fixture {
    let docs = Arc::new(FlakyDocumentStore::new());
    let blobs = Arc::new(FlakyBlobStore::new());
    let repo = StoreProductRepository::new(docs.clone(), blobs.clone());
    Fixture { repo, docs, blobs }
}

async fn seeded(fx: &Fixture, id: &str) -> ProductRecord {
    fx.repo
        .create(
            ProductRecord::new(id, SELLER, draft("Jacket")),
            vec![png("a.png", b"a"), png("b.png", b"b"), png("c.png", b"c")],
        )
        .await
        .expect("seed product")
}

#[tokio::test]
async fn created_images_keep_submission_order() {
    let fx = fixture();
    let record = seeded(&fx, "p-1").await;

    assert_eq!(record.images.len(), 3);
    for (image, expected) in record.images.iter().zip([&b"a"[..], &b"b"[..], &b"c"[..]]) {
        let blob = fx.blobs.fetch(&image.path).await.unwrap().unwrap();
        assert_eq!(blob.bytes.as_ref(), expected);
        assert!(image.path.starts_with("seller-1/p-1-"));
        assert!(image.url.ends_with(&image.path));
    }

    let stored = fx.repo.read("p-1").await.unwrap();
    assert_eq!(stored, record);
}

#[tokio::test]
async fn create_without_files_writes_a_record_without_images() {
    let fx = fixture();
    let record = fx
        .repo
        .create(ProductRecord::new("p-1", SELLER, draft("Jacket")), vec![])
        .await
        .unwrap();

    assert!(record.images.is_empty());
    assert!(fx.blobs.inner.is_empty());
    let stored = fx.docs.inner.get("products", "p-1").await.unwrap().unwrap();
    assert_eq!(stored["productImageUrls"], serde_json::json!([]));
    assert_eq!(fx.repo.read("p-1").await.unwrap(), record);
}

#[tokio::test]
async fn failed_upload_removes_the_rest_of_the_batch() {
    let fx = fixture();
    fx.blobs.fail_uploads_of(b"bad");

    let err = fx
        .repo
        .create(
            ProductRecord::new("p-1", SELLER, draft("Jacket")),
            vec![png("a.png", b"a"), png("bad.png", b"bad"), png("c.png", b"c")],
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::UploadFailure(_));
    assert!(fx.blobs.inner.is_empty());
    assert_matches!(fx.repo.read("p-1").await, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn failed_record_write_removes_uploaded_blobs() {
    let fx = fixture();
    fx.docs.fail_writes(true);

    let err = fx
        .repo
        .create(
            ProductRecord::new("p-1", SELLER, draft("Jacket")),
            vec![png("a.png", b"a")],
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::PersistFailure(_));
    assert!(fx.blobs.inner.is_empty());
}

#[tokio::test]
async fn swapping_an_image_keeps_cardinality_and_drops_the_old_blob() {
    let fx = fixture();
    let record = seeded(&fx, "p-1").await;
    let removed = record.images[1].clone();

    let report = fx
        .repo
        .update(
            &seller(),
            "p-1",
            draft("Jacket v2"),
            vec![png("d.png", b"d")],
            vec![removed.path.clone()],
        )
        .await
        .unwrap();

    assert!(report.failed_deletes.is_empty());
    let updated = report.record;
    assert_eq!(updated.name, "Jacket v2");
    assert_eq!(updated.images.len(), 3);
    assert_eq!(updated.images[0], record.images[0]);
    assert_eq!(updated.images[1], record.images[2]);
    assert!(!updated.owns_path(&removed.path));

    assert!(fx.blobs.fetch(&removed.path).await.unwrap().is_none());
    let appended = fx.blobs.fetch(&updated.images[2].path).await.unwrap().unwrap();
    assert_eq!(appended.bytes.as_ref(), b"d");

    assert_eq!(fx.repo.read("p-1").await.unwrap(), updated);
}

#[tokio::test]
async fn edit_reports_blobs_it_could_not_delete() {
    let fx = fixture();
    let record = seeded(&fx, "p-1").await;
    let removed = record.images[0].path.clone();
    fx.blobs.fail_delete_call(0);

    let report = fx
        .repo
        .update(
            &seller(),
            "p-1",
            draft("Jacket"),
            vec![png("d.png", b"d")],
            vec![removed.clone()],
        )
        .await
        .unwrap();

    assert_eq!(report.failed_deletes, vec![removed.clone()]);
    assert!(!report.record.owns_path(&removed));
    assert_eq!(report.record.images.len(), 3);
    assert!(fx.blobs.fetch(&removed).await.unwrap().is_some());
}

#[tokio::test]
async fn edit_ignores_paths_the_product_does_not_own() {
    let fx = fixture();
    seeded(&fx, "p-1").await;
    let other = seeded(&fx, "p-2").await;

    let report = fx
        .repo
        .update(
            &seller(),
            "p-1",
            draft("Jacket"),
            vec![],
            vec![other.images[0].path.clone()],
        )
        .await
        .unwrap();

    assert_eq!(report.record.images.len(), 3);
    assert!(fx.blobs.delete_calls().is_empty());
    assert!(fx.blobs.fetch(&other.images[0].path).await.unwrap().is_some());
}

#[tokio::test]
async fn edit_that_removes_every_image_is_rejected() {
    let fx = fixture();
    let record = seeded(&fx, "p-1").await;
    let all_paths: Vec<String> = record.images.iter().map(|i| i.path.clone()).collect();

    let err = fx
        .repo
        .update(&seller(), "p-1", draft("Jacket"), vec![], all_paths)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::NoImageSelected);
    assert!(fx.blobs.delete_calls().is_empty());
    assert_eq!(fx.repo.read("p-1").await.unwrap(), record);
}

#[tokio::test]
async fn failed_edit_write_removes_new_uploads() {
    let fx = fixture();
    seeded(&fx, "p-1").await;
    let before = fx.blobs.inner.len();
    fx.docs.fail_writes(true);

    let err = fx
        .repo
        .update(
            &seller(),
            "p-1",
            draft("Jacket"),
            vec![png("d.png", b"d")],
            vec![],
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::PersistFailure(_));
    assert_eq!(fx.blobs.inner.len(), before);
}

#[tokio::test]
async fn other_sellers_cannot_edit_or_delete() {
    let fx = fixture();
    seeded(&fx, "p-1").await;
    let intruder = SellerContext::new("seller-2");

    assert_matches!(
        fx.repo
            .update(&intruder, "p-1", draft("Mine now"), vec![], vec![])
            .await,
        Err(ServiceError::Forbidden(_))
    );
    assert_matches!(
        fx.repo.delete(&intruder, "p-1").await,
        Err(ServiceError::Forbidden(_))
    );
    assert_eq!(fx.blobs.inner.len(), 3);
}

#[tokio::test]
async fn delete_attempts_every_blob_and_reports_failures() {
    let fx = fixture();
    let record = seeded(&fx, "p-1").await;
    fx.blobs.fail_delete_call(1);

    let err = fx.repo.delete(&seller(), "p-1").await.unwrap_err();

    let calls = fx.blobs.delete_calls();
    assert_eq!(calls.len(), record.images.len());
    assert_matches!(err, ServiceError::DeleteFailure { paths } => {
        assert_eq!(paths, vec![calls[1].clone()]);
    });
    assert!(fx.docs.inner.get("products", "p-1").await.unwrap().is_none());
}

#[tokio::test]
async fn delete_removes_record_and_blobs() {
    let fx = fixture();
    seeded(&fx, "p-1").await;

    fx.repo.delete(&seller(), "p-1").await.unwrap();

    assert!(fx.blobs.inner.is_empty());
    assert_matches!(fx.repo.read("p-1").await, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn listing_is_scoped_to_the_seller() {
    let fx = fixture();
    seeded(&fx, "p-1").await;
    seeded(&fx, "p-2").await;
    fx.repo
        .create(
            ProductRecord::new("p-3", "seller-2", draft("Lamp")),
            vec![png("l.png", b"l")],
        )
        .await
        .unwrap();

    let mut ids: Vec<String> = fx
        .repo
        .list_by_seller(SELLER)
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["p-1", "p-2"]);
}
