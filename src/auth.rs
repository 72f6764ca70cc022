// ABOUTME: JWT issuance and verification for the HTTP surface
// ABOUTME: HS256 tokens carrying the user id in sub, verified per request from the Authorization header
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 FaleComJesus

//! Token authentication.
//!
//! Tokens are HS256 JWTs with the user id as `sub`. Handlers extract the
//! bearer token from the `Authorization` header and verify it here; expiry
//! and signature failures map to distinct error codes so clients can tell
//! "log in again" from "bad token".

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

/// Token lifetime
const TOKEN_TTL_HOURS: i64 = 24;

/// JWT claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Issued-at, seconds since epoch
    pub iat: i64,
    /// Expiry, seconds since epoch
    pub exp: i64,
}

/// Issues and verifies access tokens under one HS256 secret
pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthManager {
    /// Create a manager from the shared signing secret
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issue a token for a user
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn generate_token(&self, user_id: i64) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("token signing failed: {e}")))
    }

    /// Verify a token and return the user id it was issued for
    ///
    /// # Errors
    ///
    /// Returns an auth-expired error for an expired token and an auth-invalid
    /// error for any other verification failure.
    pub fn verify_token(&self, token: &str) -> AppResult<i64> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AppError::auth_expired(),
                _ => AppError::auth_invalid("Invalid authentication token"),
            }
        })?;

        data.claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::auth_invalid("Invalid token subject"))
    }
}

/// Extract the bearer token from an `Authorization` header value
///
/// # Errors
///
/// Returns an auth-required error when the header is missing or does not use
/// the `Bearer` scheme.
pub fn bearer_token(authorization: Option<&str>) -> AppResult<&str> {
    authorization
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or_else(AppError::auth_required)
}
