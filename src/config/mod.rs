// ABOUTME: Environment-driven server configuration loaded once at startup
// ABOUTME: Covers database, HTTP binding, JWT/encryption secrets and LLM simulation mode
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 FaleComJesus

//! Environment-only configuration. No config files: every knob is an
//! environment variable, read once at startup and immutable afterwards.

use std::env;

use tracing::warn;

use crate::errors::{AppError, AppResult};

/// Default HTTP port
const DEFAULT_HTTP_PORT: u16 = 8081;

/// Default outbound LLM call timeout in seconds
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;

/// Placeholder secret used when `SECRET_KEY` is not configured.
/// Mirrors the development default of the original deployment; never
/// acceptable in production.
const DEV_SECRET_KEY: &str = "dev_secret_key_change_in_production";

/// Server configuration resolved from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// SQLite database URL (`DATABASE_URL`)
    pub database_url: String,
    /// HTTP listen port (`HTTP_PORT`)
    pub http_port: u16,
    /// Application master secret (`SECRET_KEY`); fallback key-derivation input
    pub secret_key: String,
    /// JWT signing secret (`JWT_SECRET_KEY`); defaults to `SECRET_KEY`
    pub jwt_secret: String,
    /// Base64-encoded 256-bit credential encryption key (`API_ENCRYPTION_KEY`)
    pub api_encryption_key: Option<String>,
    /// Replace all provider network calls with fixed placeholder responses
    /// (`LLM_SIMULATION_MODE`)
    pub llm_simulation_mode: bool,
    /// Route every chat completion to one self-hosted OpenAI-compatible
    /// endpoint instead of the public provider hosts (`LLM_BASE_URL`)
    pub llm_base_url: Option<String>,
    /// Outbound provider call timeout in seconds (`LLM_TIMEOUT_SECS`)
    pub llm_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable fails to parse.
    pub fn from_env() -> AppResult<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:falecomjesus.db".into());

        let http_port = match env::var("HTTP_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|e| AppError::config(format!("Invalid HTTP_PORT '{raw}': {e}")))?,
            Err(_) => DEFAULT_HTTP_PORT,
        };

        let secret_key = env::var("SECRET_KEY").unwrap_or_else(|_| {
            warn!("SECRET_KEY not set, using development default - NOT SECURE FOR PRODUCTION");
            DEV_SECRET_KEY.into()
        });

        let jwt_secret = env::var("JWT_SECRET_KEY").unwrap_or_else(|_| secret_key.clone());

        let api_encryption_key = env::var("API_ENCRYPTION_KEY").ok();

        let llm_simulation_mode = env_flag("LLM_SIMULATION_MODE");

        let llm_base_url = env::var("LLM_BASE_URL").ok();

        let llm_timeout_secs = match env::var("LLM_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|e| AppError::config(format!("Invalid LLM_TIMEOUT_SECS '{raw}': {e}")))?,
            Err(_) => DEFAULT_LLM_TIMEOUT_SECS,
        };

        Ok(Self {
            database_url,
            http_port,
            secret_key,
            jwt_secret,
            api_encryption_key,
            llm_simulation_mode,
            llm_base_url,
            llm_timeout_secs,
        })
    }

    /// Configuration suitable for tests: in-memory database, simulation mode on
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            database_url: "sqlite::memory:".into(),
            http_port: 0,
            secret_key: "test_secret_key".into(),
            jwt_secret: "test_jwt_secret".into(),
            api_encryption_key: None,
            llm_simulation_mode: true,
            llm_base_url: None,
            llm_timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
        }
    }
}

/// Parse a boolean environment flag ("true"/"1"/"yes", case-insensitive)
fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}
