// ABOUTME: Credential usage accounting tests against a stubbed OpenAI-compatible endpoint
// ABOUTME: Drives real chat turns through the router and checks use_count and last_used bookkeeping
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 FaleComJesus

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{header as header_matcher, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use falecomjesus_server::config::ServerConfig;
use falecomjesus_server::database::Database;
use falecomjesus_server::server::{router, ServerResources};

struct TestHarness {
    app: Router,
    resources: Arc<ServerResources>,
    token: String,
    user_id: i64,
}

/// Harness with simulation off and every provider routed to the stub server.
async fn harness_against(endpoint: &str) -> TestHarness {
    let mut config = ServerConfig::for_testing();
    config.llm_simulation_mode = false;
    config.llm_base_url = Some(endpoint.to_owned());

    let database = Database::connect(&config.database_url).await.unwrap();
    let user_id = database.create_user("fiel@example.com").await.unwrap();

    let resources = Arc::new(ServerResources::new(config, database).unwrap());
    let token = resources.auth.generate_token(user_id).unwrap();

    TestHarness {
        app: router(resources.clone()),
        resources,
        token,
        user_id,
    }
}

fn chat_request(token: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat/message")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_each_real_turn_increments_usage_and_refreshes_last_used() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header_matcher("Authorization", "Bearer sk-live-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Paz seja convosco."}}]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let h = harness_against(&server.uri()).await;
    h.resources
        .vault
        .set_credential(h.user_id, "openai", "sk-live-test")
        .await
        .unwrap();

    let before_turns = Utc::now();

    let first = h
        .app
        .clone()
        .oneshot(chat_request(
            &h.token,
            &json!({"message": "primeira", "provider": "openai"}),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let conversation_id = body_json(first).await["conversation_id"].as_i64().unwrap();

    let second = h
        .app
        .clone()
        .oneshot(chat_request(
            &h.token,
            &json!({
                "message": "segunda",
                "provider": "openai",
                "conversation_id": conversation_id
            }),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(body_json(second).await["response"], "Paz seja convosco.");

    let stored = h
        .resources
        .database
        .get_active_credential(h.user_id, "openai")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.use_count, 2);
    assert!(stored.last_used.unwrap() >= before_turns);
}

#[tokio::test]
async fn test_failed_provider_call_does_not_count_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "upstream exploded"}
        })))
        .mount(&server)
        .await;

    let h = harness_against(&server.uri()).await;
    h.resources
        .vault
        .set_credential(h.user_id, "openai", "sk-live-test")
        .await
        .unwrap();

    let response = h
        .app
        .clone()
        .oneshot(chat_request(
            &h.token,
            &json!({"message": "oi", "provider": "openai"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let stored = h
        .resources
        .database
        .get_active_credential(h.user_id, "openai")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.use_count, 0);
    assert!(stored.last_used.is_none());
}
