// ABOUTME: Credential route tests over the assembled router
// ABOUTME: Create-vs-update status codes, secret redaction and user-scoped deletion
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 FaleComJesus

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use falecomjesus_server::config::ServerConfig;
use falecomjesus_server::database::Database;
use falecomjesus_server::server::{router, ServerResources};

struct TestHarness {
    app: Router,
    token: String,
    other_token: String,
}

async fn harness() -> TestHarness {
    let config = ServerConfig::for_testing();
    let database = Database::connect(&config.database_url).await.unwrap();
    let user_id = database.create_user("ana@example.com").await.unwrap();
    let other_id = database.create_user("bento@example.com").await.unwrap();

    let resources = Arc::new(ServerResources::new(config, database).unwrap());
    let token = resources.auth.generate_token(user_id).unwrap();
    let other_token = resources.auth.generate_token(other_id).unwrap();

    TestHarness {
        app: router(resources),
        token,
        other_token,
    }
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_create_then_update_distinguished_by_status() {
    let h = harness().await;

    let created = h
        .app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/keys",
            Some(&h.token),
            &json!({"provider": "openai", "api_key": "sk-first"}),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let created_body = body_json(created).await;
    let credential_id = created_body["api_key"]["id"].as_i64().unwrap();

    let updated = h
        .app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/keys",
            Some(&h.token),
            &json!({"provider": "openai", "api_key": "sk-second"}),
        ))
        .await
        .unwrap();
    assert_eq!(updated.status(), StatusCode::OK);
    let updated_body = body_json(updated).await;

    // Replaced in place, same row.
    assert_eq!(updated_body["api_key"]["id"].as_i64().unwrap(), credential_id);
}

#[tokio::test]
async fn test_listing_never_contains_the_secret() {
    let h = harness().await;

    h.app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/keys",
            Some(&h.token),
            &json!({"provider": "anthropic", "api_key": "sk-ant-secret"}),
        ))
        .await
        .unwrap();

    let listing = h
        .app
        .clone()
        .oneshot(get("/api/keys", &h.token))
        .await
        .unwrap();
    assert_eq!(listing.status(), StatusCode::OK);

    let body = body_json(listing).await;
    let keys = body["api_keys"].as_array().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0]["provider"], "anthropic");

    let raw = body.to_string();
    assert!(!raw.contains("sk-ant-secret"));
    assert!(!raw.contains("key_encrypted"));
}

#[tokio::test]
async fn test_delete_is_scoped_to_the_owner() {
    let h = harness().await;

    let created = h
        .app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/keys",
            Some(&h.token),
            &json!({"provider": "google", "api_key": "AIza-test"}),
        ))
        .await
        .unwrap();
    let credential_id = body_json(created).await["api_key"]["id"].as_i64().unwrap();

    // Another user deleting this id gets the same 404 as a missing row.
    let foreign_delete = h
        .app
        .clone()
        .oneshot(json_request(
            Method::DELETE,
            "/api/keys",
            Some(&h.other_token),
            &json!({"id": credential_id}),
        ))
        .await
        .unwrap();
    assert_eq!(foreign_delete.status(), StatusCode::NOT_FOUND);

    let owner_delete = h
        .app
        .clone()
        .oneshot(json_request(
            Method::DELETE,
            "/api/keys",
            Some(&h.token),
            &json!({"id": credential_id}),
        ))
        .await
        .unwrap();
    assert_eq!(owner_delete.status(), StatusCode::OK);

    let listing = body_json(
        h.app
            .clone()
            .oneshot(get("/api/keys", &h.token))
            .await
            .unwrap(),
    )
    .await;
    assert!(listing["api_keys"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_blank_key_is_rejected() {
    let h = harness().await;

    let response = h
        .app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/keys",
            Some(&h.token),
            &json!({"provider": "openai", "api_key": "   "}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_keys_require_authentication() {
    let h = harness().await;

    let response = h
        .app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/keys",
            None,
            &json!({"provider": "openai", "api_key": "sk-x"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
