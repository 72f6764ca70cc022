// ABOUTME: Route module organization for the HTTP surface
// ABOUTME: Thin handlers per domain that authenticate in-handler and delegate to services
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 FaleComJesus

//! HTTP route modules organized by domain. Each module holds route
//! definitions plus thin handlers; authentication happens inside each
//! handler from the `Authorization` header.

/// Chat message and conversation routes
pub mod chat;
/// Health check route
pub mod health;
/// Credential management routes
pub mod keys;

pub use chat::ChatRoutes;
pub use health::HealthRoutes;
pub use keys::KeyRoutes;

use axum::http::HeaderMap;

use crate::errors::AppResult;
use crate::server::ServerResources;

/// Authenticate a request from its `Authorization` header, returning the
/// verified user id.
pub(crate) fn authenticate(headers: &HeaderMap, resources: &ServerResources) -> AppResult<i64> {
    let authorization = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let token = crate::auth::bearer_token(authorization)?;
    resources.auth.verify_token(token)
}
