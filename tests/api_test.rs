//! HTTP-level tests for the marketplace router.
//!
//! Tests cover:
//! - Signup, login, logout and token revocation
//! - Seller-only product authoring endpoints
//! - Serving uploaded images back through /files
//! - Error bodies with field violations and request ids

mod common;

use axum::http::{header, Method, StatusCode};
use common::{attachment, product_body, response_json, TestApp, PASSWORD};
use marketplace_api::store::BlobStore;
use serde_json::json;

#[tokio::test]
async fn health_reports_document_store() {
    let app = TestApp::new();
    let response = app.request(Method::GET, "/health", None, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["document_store"], "healthy");
}

#[tokio::test]
async fn signup_rejects_mismatched_passwords_with_violations() {
    let app = TestApp::new();
    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/signup",
            Some(json!({
                "email": "mina@example.com",
                "password": PASSWORD,
                "check_password": "different-pass-1!",
            })),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    let fields: Vec<&str> = body["violations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["check_password"]);
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn duplicate_signup_is_a_conflict() {
    let app = TestApp::new();
    app.sign_up_and_login("mina@example.com", false).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/signup",
            Some(json!({
                "email": "mina@example.com",
                "password": PASSWORD,
                "check_password": PASSWORD,
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn me_requires_a_token_and_logout_revokes_it() {
    let app = TestApp::new();
    let (token, profile) = app.sign_up_and_login("mina@example.com", true).await;

    let response = app.request(Method::GET, "/api/v1/auth/me", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(Method::GET, "/api/v1/auth/me", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let me = response_json(response).await;
    assert_eq!(me["user_id"], profile["user_id"]);
    assert_eq!(me["is_seller"], true);

    let response = app
        .request(Method::POST, "/api/v1/auth/logout", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request(Method::GET, "/api/v1/auth/me", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = TestApp::new();
    app.sign_up_and_login("mina@example.com", false).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "mina@example.com", "password": "wrong-pass-99!" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["violations"][0]["field"], "password");
}

#[tokio::test]
async fn buyers_cannot_author_products() {
    let app = TestApp::new();
    let (token, _) = app.sign_up_and_login("buyer@example.com", false).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(product_body("Coat", vec![attachment("a.png", b"a")])),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.blobs.is_empty());
}

#[tokio::test]
async fn product_without_images_is_created_but_cannot_lose_its_last_image() {
    let app = TestApp::new();
    let (token, _) = app.sign_up_and_login("seller@example.com", true).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(product_body("Coat", vec![])),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = response_json(response).await;
    assert_eq!(created["images"], json!([]));
    let id = created["id"].as_str().unwrap().to_string();

    let mut edit = product_body("Coat", vec![]);
    edit["retained_paths"] = json!([]);
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/products/{id}"),
            Some(edit),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["violations"][0]["field"], "images");
}

#[tokio::test]
async fn edit_response_lists_image_blobs_left_behind() {
    let app = TestApp::new();
    let (token, _) = app.sign_up_and_login("seller@example.com", true).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(product_body("Coat", vec![attachment("a.png", b"a")])),
            Some(&token),
        )
        .await;
    let created = response_json(response).await;
    assert!(created.get("undeleted_images").is_none());
    let id = created["id"].as_str().unwrap().to_string();
    let old_path = created["images"][0]["path"].clone();

    app.blobs.fail_delete_call(0);
    let mut edit = product_body("Coat", vec![attachment("b.png", b"b")]);
    edit["retained_paths"] = json!([]);
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/products/{id}"),
            Some(edit),
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let edited = response_json(response).await;
    assert_eq!(edited["undeleted_images"], json!([old_path]));
    assert_eq!(edited["images"].as_array().unwrap().len(), 1);
    assert_ne!(edited["images"][0]["path"], old_path);
}

#[tokio::test]
async fn malformed_json_gets_the_standard_error_body() {
    let app = TestApp::new();
    let (token, _) = app.sign_up_and_login("seller@example.com", true).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "name": "Coat", "price": "cheap" })),
            Some(&token),
        )
        .await;
    assert!(response.status().is_client_error());
    let body = response_json(response).await;
    assert_eq!(body["error"], "Bad Request");
}

#[tokio::test]
async fn seller_creates_edits_lists_and_deletes_a_product() {
    let app = TestApp::new();
    let (token, profile) = app.sign_up_and_login("seller@example.com", true).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(product_body(
                "Coat",
                vec![attachment("a.png", b"first"), attachment("b.png", b"second")],
            )),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = response_json(response).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["seller_id"], profile["user_id"]);
    assert_eq!(created["images"].as_array().unwrap().len(), 2);

    // Served back with the uploaded content type.
    let first_path = created["images"][0]["path"].as_str().unwrap().to_string();
    let response = app
        .request(Method::GET, &format!("/files/{first_path}"), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

    // Keep the second image, drop the first, append a third.
    let kept = created["images"][1]["path"].clone();
    let mut edit = product_body("Winter coat", vec![attachment("c.png", b"third")]);
    edit["retained_paths"] = json!([kept]);
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/products/{id}"),
            Some(edit),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let edited = response_json(response).await;
    assert_eq!(edited["name"], "Winter coat");
    let images = edited["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0]["path"], kept);
    assert!(app.blobs.fetch(&first_path).await.unwrap().is_none());

    let response = app
        .request(Method::GET, &format!("/api/v1/products/{id}"), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await, edited);

    let response = app
        .request(Method::GET, "/api/v1/me/products", None, Some(&token))
        .await;
    let listed = response_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/products/{id}"),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(app.blobs.is_empty());

    let response = app
        .request(Method::GET, &format!("/api/v1/products/{id}"), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn another_seller_cannot_edit_a_product() {
    let app = TestApp::new();
    let (owner, _) = app.sign_up_and_login("owner@example.com", true).await;
    let (other, _) = app.sign_up_and_login("other@example.com", true).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(product_body("Coat", vec![attachment("a.png", b"a")])),
            Some(&owner),
        )
        .await;
    let id = response_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/products/{id}"),
            Some(product_body("Mine", vec![])),
            Some(&other),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/products/{id}"),
            None,
            Some(&other),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.blobs.len(), 1);
}

#[tokio::test]
async fn unknown_files_are_not_found() {
    let app = TestApp::new();
    let response = app
        .request(Method::GET, "/files/nobody/nothing", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
