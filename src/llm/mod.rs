// ABOUTME: Unified LLM provider dispatch for multi-provider chat completion
// ABOUTME: Closed set of named providers with a generic OpenAI-shaped fallback for unknown names
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 FaleComJesus

//! # LLM Provider Dispatch
//!
//! Every provider implements [`LlmProvider`] by describing its wire format
//! (URL, headers, request body, response envelope); the shared
//! `get_response` default drives the HTTP exchange. [`ChatProvider`] wraps
//! the concrete providers behind one enum so callers dispatch by stored
//! provider name alone.
//!
//! Unknown provider names are never rejected: they fall through to an
//! OpenAI-shaped generic handler pointed at `https://api.{name}.com/v1`.

pub mod anthropic;
pub mod google;
pub mod openai_compatible;
pub mod prompts;

pub use anthropic::AnthropicProvider;
pub use google::GoogleProvider;
pub use openai_compatible::OpenAiCompatibleProvider;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::errors::{AppError, AppResult};

/// Sampling temperature sent to every provider that accepts one
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Completion token cap sent to every provider
pub const DEFAULT_MAX_TOKENS: u32 = 800;

/// A fully prepared outbound provider call.
///
/// Secrets may appear in the URL (Google keys travel as a query parameter),
/// so this type is deliberately not `Debug`.
pub struct ProviderRequest {
    /// Endpoint URL, credentials included where the provider wants them there
    pub url: String,
    /// Extra headers beyond content type
    pub headers: Vec<(&'static str, String)>,
    /// JSON request body
    pub body: Value,
}

/// One LLM provider's wire format
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Canonical lowercase provider name
    fn name(&self) -> &str;

    /// Human-readable provider name for logs and listings
    fn display_name(&self) -> &str;

    /// Model used when the caller does not specify one
    fn default_model(&self) -> &str;

    /// Build the outbound request for a rendered prompt
    fn render_request(&self, api_key: &str, model: &str, prompt: &str) -> ProviderRequest;

    /// Extract the completion text from a success response body
    ///
    /// # Errors
    ///
    /// Returns an error when the body does not match the provider's envelope.
    fn parse_response(&self, body: &Value) -> AppResult<String>;

    /// Send the prompt and return the completion text.
    ///
    /// Always performs a real network call. Simulation mode is resolved by
    /// the chat orchestrator before any provider is invoked; callers that
    /// dispatch a provider directly must check it themselves (see
    /// [`simulated_response`]).
    ///
    /// # Errors
    ///
    /// Returns an external-service error for connection failures, timeouts,
    /// non-success status codes and unparseable response bodies.
    async fn get_response(
        &self,
        client: &Client,
        api_key: &str,
        model: Option<&str>,
        prompt: &str,
    ) -> AppResult<String> {
        let model = model.unwrap_or_else(|| self.default_model());
        let request = self.render_request(api_key, model, prompt);

        debug!(provider = self.name(), model, "dispatching chat completion");

        let mut builder = client.post(&request.url).json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }

        let response = builder.send().await.map_err(|e| {
            error!(provider = self.name(), error = %e, "provider request failed");
            AppError::external_service(self.name(), format!("request failed: {e}"))
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            AppError::external_service(self.name(), format!("failed to read response: {e}"))
        })?;

        if !status.is_success() {
            error!(
                provider = self.name(),
                status = status.as_u16(),
                body = %text,
                "provider returned error status"
            );
            return Err(AppError::external_service(
                self.name(),
                format!("HTTP {status}"),
            ));
        }

        let body: Value = serde_json::from_str(&text).map_err(|e| {
            AppError::external_service(self.name(), format!("invalid JSON response: {e}"))
        })?;

        self.parse_response(&body)
    }
}

/// Unified chat provider selected by stored provider name.
///
/// The enum is closed; names outside the known set map to the `Generic`
/// variant rather than an error, so a credential stored for a niche
/// OpenAI-compatible host still dispatches.
pub enum ChatProvider {
    /// OpenAI chat completions
    OpenAi(OpenAiCompatibleProvider),
    /// Anthropic messages API
    Anthropic(AnthropicProvider),
    /// Google Gemini generateContent API
    Google(GoogleProvider),
    /// Mistral chat completions (OpenAI-shaped)
    Mistral(OpenAiCompatibleProvider),
    /// Fallback OpenAI-shaped dispatch for any other provider name
    Generic(OpenAiCompatibleProvider),
}

impl ChatProvider {
    /// Select a provider by name, case-insensitively.
    ///
    /// Unknown names get the generic OpenAI-shaped handler pointed at
    /// `https://api.{name}.com/v1`.
    #[must_use]
    pub fn for_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "openai" => Self::OpenAi(OpenAiCompatibleProvider::openai()),
            "anthropic" => Self::Anthropic(AnthropicProvider::new()),
            "google" => Self::Google(GoogleProvider::new()),
            "mistral" => Self::Mistral(OpenAiCompatibleProvider::mistral()),
            other => {
                warn!(provider = other, "no dedicated handler, using generic dispatch");
                Self::Generic(OpenAiCompatibleProvider::generic(other))
            }
        }
    }

    fn inner(&self) -> &dyn LlmProvider {
        match self {
            Self::OpenAi(p) | Self::Mistral(p) | Self::Generic(p) => p,
            Self::Anthropic(p) => p,
            Self::Google(p) => p,
        }
    }

    /// Canonical provider name
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner().name()
    }

    /// Human-readable provider name
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.inner().display_name()
    }

    /// Model used when the caller does not specify one
    #[must_use]
    pub fn default_model(&self) -> &str {
        self.inner().default_model()
    }

    /// Build the outbound request without sending it
    #[must_use]
    pub fn render_request(&self, api_key: &str, model: &str, prompt: &str) -> ProviderRequest {
        self.inner().render_request(api_key, model, prompt)
    }

    /// Send the prompt to the selected provider.
    ///
    /// Always hits the network; simulation mode never reaches this method
    /// (the orchestrator answers with [`simulated_response`] first).
    ///
    /// # Errors
    ///
    /// Returns an external-service error when the exchange fails.
    pub async fn get_response(
        &self,
        client: &Client,
        api_key: &str,
        model: Option<&str>,
        prompt: &str,
    ) -> AppResult<String> {
        self.inner().get_response(client, api_key, model, prompt).await
    }
}

/// Scripted placeholder response for simulation mode.
///
/// Echoes the raw user message with a fixed verse per provider so local
/// development needs no real credentials.
#[must_use]
pub fn simulated_response(provider_name: &str, message: &str) -> String {
    let verse = match provider_name.to_ascii_lowercase().as_str() {
        "openai" => {
            "João 3:16, 'Porque Deus amou o mundo de tal maneira que deu o seu \
             Filho unigênito, para que todo aquele que nele crê não pereça, mas \
             tenha a vida eterna.'"
        }
        "anthropic" => "Salmos 23:1, 'O Senhor é o meu pastor, nada me faltará.'",
        "google" => {
            "Provérbios 3:5-6, 'Confia no Senhor de todo o teu coração e não te \
             estribes no teu próprio entendimento. Reconhece-o em todos os teus \
             caminhos, e ele endireitará as tuas veredas.'"
        }
        "mistral" => {
            "Mateus 11:28, 'Vinde a mim, todos os que estais cansados e \
             oprimidos, e eu vos aliviarei.'"
        }
        _ => "Filipenses 4:13, 'Posso todas as coisas naquele que me fortalece.'",
    };

    format!("Resposta simulada para: '{message}'\n\nComo diz em {verse}")
}

/// Build the shared outbound HTTP client with the configured timeout
///
/// # Errors
///
/// Returns a config error if the client cannot be constructed.
pub fn http_client(timeout_secs: u64) -> AppResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AppError::config(format!("failed to build HTTP client: {e}")))
}
