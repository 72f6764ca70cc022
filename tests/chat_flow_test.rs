// ABOUTME: End-to-end chat flow tests over the assembled router
// ABOUTME: Exercises the full turn pipeline in simulation mode plus credential-missing rejection
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 FaleComJesus

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use falecomjesus_server::config::ServerConfig;
use falecomjesus_server::database::Database;
use falecomjesus_server::server::{router, ServerResources};

struct TestHarness {
    app: Router,
    token: String,
}

async fn harness_with_config(config: ServerConfig) -> TestHarness {
    let database = Database::connect(&config.database_url).await.unwrap();
    let user_id = database.create_user("fiel@example.com").await.unwrap();

    let resources = Arc::new(ServerResources::new(config, database).unwrap());
    let token = resources.auth.generate_token(user_id).unwrap();

    TestHarness {
        app: router(resources),
        token,
    }
}

async fn harness() -> TestHarness {
    harness_with_config(ServerConfig::for_testing()).await
}

fn post_json(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
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
async fn test_chat_turn_end_to_end_in_simulation_mode() {
    let h = harness().await;

    let request = post_json(
        "/api/chat/message",
        Some(&h.token),
        &json!({"message": "Estou ansioso", "provider": "openai"}),
    );
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let text = body["response"].as_str().unwrap();
    assert!(text.contains("Resposta simulada para: 'Estou ansioso'"));
    assert!(text.contains("João 3:16"));

    let conversation_id = body["conversation_id"].as_i64().unwrap();

    // The exchange was persisted in order with metadata on the bot turn.
    let response = h
        .app
        .clone()
        .oneshot(get(
            &format!("/api/chat/conversations/{conversation_id}"),
            &h.token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let detail = body_json(response).await;
    assert_eq!(detail["conversation"]["title"], "Estou ansioso");

    let messages = detail["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["sender"], "user");
    assert_eq!(messages[0]["content"], "Estou ansioso");
    assert_eq!(messages[1]["sender"], "bot");
    assert_eq!(messages[1]["metadata"]["provider"], "openai");
    assert_eq!(messages[1]["metadata"]["regenerated"], false);
}

#[tokio::test]
async fn test_second_turn_reuses_conversation() {
    let h = harness().await;

    let first = h
        .app
        .clone()
        .oneshot(post_json(
            "/api/chat/message",
            Some(&h.token),
            &json!({"message": "primeira", "provider": "google"}),
        ))
        .await
        .unwrap();
    let conversation_id = body_json(first).await["conversation_id"].as_i64().unwrap();

    let second = h
        .app
        .clone()
        .oneshot(post_json(
            "/api/chat/message",
            Some(&h.token),
            &json!({
                "message": "segunda",
                "provider": "google",
                "conversation_id": conversation_id
            }),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(
        body_json(second).await["conversation_id"].as_i64().unwrap(),
        conversation_id
    );

    let listing = h
        .app
        .clone()
        .oneshot(get("/api/chat/conversations", &h.token))
        .await
        .unwrap();
    let listed = body_json(listing).await;
    assert_eq!(listed["conversations"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_chat_requires_authentication() {
    let h = harness().await;

    let request = post_json(
        "/api/chat/message",
        None,
        &json!({"message": "oi", "provider": "openai"}),
    );
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_credential_rejected_when_simulation_off() {
    let mut config = ServerConfig::for_testing();
    config.llm_simulation_mode = false;
    let h = harness_with_config(config).await;

    let request = post_json(
        "/api/chat/message",
        Some(&h.token),
        &json!({"message": "sem chave", "provider": "openai"}),
    );
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "CREDENTIAL_MISSING");
    assert!(body["error"]["message"].as_str().unwrap().contains("openai"));
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let h = harness().await;

    let request = post_json(
        "/api/chat/message",
        Some(&h.token),
        &json!({"message": "   ", "provider": "openai"}),
    );
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_foreign_conversation_is_not_found() {
    let h = harness().await;

    let request = post_json(
        "/api/chat/message",
        Some(&h.token),
        &json!({"message": "oi", "provider": "openai", "conversation_id": 999}),
    );
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
