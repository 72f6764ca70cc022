// ABOUTME: Server resource wiring and HTTP serve loop
// ABOUTME: Builds the shared resource container, assembles the router and runs axum with graceful shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 FaleComJesus

//! Server composition root.
//!
//! [`ServerResources`] owns every long-lived service handle and is shared
//! across handlers behind one `Arc`. [`run`] connects the database, seeds
//! the default system template and serves the router until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::AuthManager;
use crate::chat::ChatService;
use crate::config::ServerConfig;
use crate::credentials::CredentialVault;
use crate::crypto::SecretCipher;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::llm;
use crate::llm::prompts::DEFAULT_PROMPT_TEMPLATE;
use crate::routes::{ChatRoutes, HealthRoutes, KeyRoutes};

/// Name of the seeded system prompt template
const SYSTEM_TEMPLATE_NAME: &str = "Orientação Espiritual";

/// Long-lived service handles shared by every request handler
pub struct ServerResources {
    /// Persistence layer
    pub database: Database,
    /// Encrypted credential vault
    pub vault: CredentialVault,
    /// Chat turn orchestrator
    pub chat: ChatService,
    /// Token issuance and verification
    pub auth: AuthManager,
    /// Resolved startup configuration
    pub config: ServerConfig,
}

impl ServerResources {
    /// Wire all services from configuration and a connected database
    ///
    /// # Errors
    ///
    /// Returns an error when the encryption key or HTTP client cannot be
    /// constructed.
    pub fn new(config: ServerConfig, database: Database) -> AppResult<Self> {
        let cipher = Arc::new(SecretCipher::from_config(
            config.api_encryption_key.as_deref(),
            &config.secret_key,
        )?);
        let vault = CredentialVault::new(database.clone(), cipher);
        let http = llm::http_client(config.llm_timeout_secs)?;
        let mut chat = ChatService::new(
            database.clone(),
            vault.clone(),
            http,
            config.llm_simulation_mode,
        );
        if let Some(base_url) = &config.llm_base_url {
            chat = chat.with_base_url_override(base_url);
        }
        let auth = AuthManager::new(&config.jwt_secret);

        Ok(Self {
            database,
            vault,
            chat,
            auth,
            config,
        })
    }
}

/// Assemble the full application router
pub fn router(resources: Arc<ServerResources>) -> Router {
    Router::new()
        .merge(HealthRoutes::routes())
        .merge(ChatRoutes::routes(resources.clone()))
        .merge(KeyRoutes::routes(resources))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Connect, seed and serve until shutdown
///
/// # Errors
///
/// Returns an error when startup wiring, binding or serving fails.
pub async fn run(config: ServerConfig) -> AppResult<()> {
    let database = Database::connect(&config.database_url).await?;
    database
        .seed_system_template(SYSTEM_TEMPLATE_NAME, DEFAULT_PROMPT_TEMPLATE)
        .await?;

    let port = config.http_port;
    let simulation = config.llm_simulation_mode;
    let resources = Arc::new(ServerResources::new(config, database)?);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::config(format!("failed to bind {addr}: {e}")))?;

    info!(%addr, simulation, "server listening");

    axum::serve(listener, router(resources))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("server error: {e}")))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install shutdown handler");
        return;
    }
    info!("shutdown signal received");
}
