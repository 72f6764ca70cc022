// ABOUTME: Credential management HTTP routes
// ABOUTME: POST/GET/DELETE /api/keys; responses carry credential metadata, never the secret
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 FaleComJesus

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::authenticate;
use crate::credentials::StoreOutcome;
use crate::errors::AppError;
use crate::models::CredentialSummary;
use crate::server::ServerResources;

/// Request body for storing a credential
#[derive(Debug, Deserialize)]
pub struct SetKeyRequest {
    /// Provider name
    pub provider: String,
    /// Plaintext API key; encrypted before it reaches storage
    pub api_key: String,
}

/// Response after storing a credential
#[derive(Debug, Serialize, Deserialize)]
pub struct SetKeyResponse {
    /// Status line for the client
    pub message: String,
    /// Stored credential metadata
    pub api_key: CredentialSummary,
}

/// Credential listing response
#[derive(Debug, Serialize, Deserialize)]
pub struct ListKeysResponse {
    /// All credentials of the authenticated user, without secrets
    pub api_keys: Vec<CredentialSummary>,
}

/// Request body for deleting a credential
#[derive(Debug, Deserialize)]
pub struct DeleteKeyRequest {
    /// Credential row id
    pub id: i64,
}

/// Credential routes handler
pub struct KeyRoutes;

impl KeyRoutes {
    /// Create all credential routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/keys", post(Self::set_key))
            .route("/api/keys", get(Self::list_keys))
            .route("/api/keys", delete(Self::delete_key))
            .with_state(resources)
    }

    /// Store or replace the credential for a provider.
    ///
    /// 201 when a new credential was created, 200 when an existing one was
    /// replaced in place.
    async fn set_key(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<SetKeyRequest>,
    ) -> Result<Response, AppError> {
        let user_id = authenticate(&headers, &resources)?;

        let provider = request.provider.trim().to_ascii_lowercase();
        if provider.is_empty() {
            return Err(AppError::invalid_input("provider must not be empty"));
        }
        if request.api_key.trim().is_empty() {
            return Err(AppError::invalid_input("api_key must not be empty"));
        }

        let (summary, outcome) = resources
            .vault
            .set_credential(user_id, &provider, request.api_key.trim())
            .await?;

        let (status, message) = match outcome {
            StoreOutcome::Created => (StatusCode::CREATED, "API key created"),
            StoreOutcome::Updated => (StatusCode::OK, "API key updated"),
        };

        Ok((
            status,
            Json(SetKeyResponse {
                message: message.to_owned(),
                api_key: summary,
            }),
        )
            .into_response())
    }

    /// List the user's credentials, metadata only
    async fn list_keys(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<ListKeysResponse>, AppError> {
        let user_id = authenticate(&headers, &resources)?;

        let api_keys = resources.vault.list_credentials(user_id).await?;
        Ok(Json(ListKeysResponse { api_keys }))
    }

    /// Delete one of the user's credentials.
    ///
    /// A foreign credential id gets the same 404 as a missing one.
    async fn delete_key(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<DeleteKeyRequest>,
    ) -> Result<Json<serde_json::Value>, AppError> {
        let user_id = authenticate(&headers, &resources)?;

        let deleted = resources
            .vault
            .delete_credential(user_id, request.id)
            .await?;
        if !deleted {
            return Err(AppError::not_found("API key"));
        }

        Ok(Json(serde_json::json!({ "message": "API key deleted" })))
    }
}
