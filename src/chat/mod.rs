// ABOUTME: Chat turn orchestrator tying conversations, credentials, prompts and providers together
// ABOUTME: Persists the user message before any provider work so input survives provider failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 FaleComJesus

//! # Chat Orchestrator
//!
//! One chat turn is a sequential pipeline: resolve or create the
//! conversation, persist the user message, resolve the credential, resolve
//! the optional template, render the prompt with prior turns as context,
//! invoke the provider, persist the bot message with response metadata.
//!
//! The user message is written before any credential or provider work;
//! every failure past that point leaves it in place. Provider failures
//! reach the client as a generic service error while the full detail is
//! logged server-side.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::credentials::{CredentialVault, ResolvedSecret};
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::llm::prompts::{self, HistoryTurn, PromptContext};
use crate::llm::{simulated_response, ChatProvider, OpenAiCompatibleProvider};
use crate::models::{ConversationRecord, MessageSender};

/// Longest auto-derived conversation title, in characters
const TITLE_MAX_CHARS: usize = 50;

/// One incoming chat turn
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatTurnRequest {
    /// The user's message text
    pub message: String,
    /// Provider name; unknown names dispatch generically
    pub provider: String,
    /// Model override; the provider default applies when absent
    #[serde(default)]
    pub model: Option<String>,
    /// Existing conversation to continue; a new one is created when absent
    #[serde(default)]
    pub conversation_id: Option<i64>,
    /// Optional prompt template
    #[serde(default)]
    pub template_id: Option<i64>,
    /// Whether this turn re-generates a previous response
    #[serde(default)]
    pub regenerate: bool,
}

/// Result of a completed chat turn
#[derive(Debug)]
pub struct ChatTurnOutcome {
    /// The bot response text
    pub response: String,
    /// Conversation the exchange was recorded against
    pub conversation_id: i64,
}

/// Orchestrates one chat turn end to end
#[derive(Clone)]
pub struct ChatService {
    db: Database,
    vault: CredentialVault,
    http: Client,
    simulation_mode: bool,
    base_url_override: Option<String>,
}

impl ChatService {
    /// Create the orchestrator
    #[must_use]
    pub fn new(db: Database, vault: CredentialVault, http: Client, simulation_mode: bool) -> Self {
        Self {
            db,
            vault,
            http,
            simulation_mode,
            base_url_override: None,
        }
    }

    /// Route every provider to one self-hosted OpenAI-compatible endpoint
    /// (`LLM_BASE_URL`) instead of the public hosts.
    #[must_use]
    pub fn with_base_url_override(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    fn select_provider(&self, name: &str) -> ChatProvider {
        match &self.base_url_override {
            Some(base) => ChatProvider::Generic(OpenAiCompatibleProvider::custom(name, base)),
            None => ChatProvider::for_name(name),
        }
    }

    /// Process one chat turn for an authenticated user.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty message or provider, not-found
    /// for a foreign or missing conversation/template, permission-denied for
    /// a private template owned by someone else, credential-missing when no
    /// usable credential exists and simulation mode is off, and an external
    /// service error when the provider call fails.
    pub async fn send_message(
        &self,
        user_id: i64,
        request: ChatTurnRequest,
    ) -> AppResult<ChatTurnOutcome> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(AppError::invalid_input("message must not be empty"));
        }
        if request.provider.trim().is_empty() {
            return Err(AppError::invalid_input("provider must not be empty"));
        }

        let provider = self.select_provider(&request.provider);

        let conversation = self
            .resolve_conversation(user_id, request.conversation_id, message)
            .await?;

        // User input survives any later failure, provider calls included.
        let user_message = self
            .db
            .append_message(conversation.id, message, MessageSender::User, None)
            .await?;

        let credential = self
            .vault
            .decrypted_secret(user_id, provider.name())
            .await?;
        if credential.is_none() && !self.simulation_mode {
            return Err(AppError::credential_missing(provider.name()));
        }

        let template = self.resolve_template(user_id, request.template_id).await?;

        let history = self
            .db
            .list_messages(conversation.id)
            .await?
            .into_iter()
            .filter(|m| m.id != user_message.id)
            .map(|m| HistoryTurn {
                content: m.content,
                sender: m.sender,
            })
            .collect();

        let context = PromptContext {
            user_id: Some(user_id),
            conversation_id: Some(conversation.id),
            history,
        };
        let prompt = prompts::render_or_fallback(message, template.as_deref(), &context);

        let model = request.model.as_deref().unwrap_or_else(|| provider.default_model());
        let response = self
            .complete(&provider, credential.as_ref(), model, &prompt, message)
            .await?;

        let metadata = json!({
            "provider": provider.name(),
            "model": model,
            "regenerated": request.regenerate,
        });
        self.db
            .append_message(conversation.id, &response, MessageSender::Bot, Some(&metadata))
            .await?;

        info!(
            user_id,
            conversation_id = conversation.id,
            provider = provider.name(),
            model,
            "chat turn completed"
        );

        Ok(ChatTurnOutcome {
            response,
            conversation_id: conversation.id,
        })
    }

    async fn resolve_conversation(
        &self,
        user_id: i64,
        conversation_id: Option<i64>,
        message: &str,
    ) -> AppResult<ConversationRecord> {
        match conversation_id {
            Some(id) => self
                .db
                .get_conversation(id, user_id)
                .await?
                .ok_or_else(|| AppError::not_found("Conversation")),
            None => {
                let title = derive_title(message);
                self.db.create_conversation(user_id, &title).await
            }
        }
    }

    async fn resolve_template(
        &self,
        user_id: i64,
        template_id: Option<i64>,
    ) -> AppResult<Option<String>> {
        let Some(id) = template_id else {
            return Ok(None);
        };

        let record = self
            .db
            .get_template(id)
            .await?
            .ok_or_else(|| AppError::not_found("Template"))?;

        if !record.accessible_by(user_id) {
            return Err(AppError::access_denied("Access denied to this template"));
        }

        Ok(Some(record.template))
    }

    /// Produce the response text, recording credential usage only when a real
    /// credential made a real provider call.
    async fn complete(
        &self,
        provider: &ChatProvider,
        credential: Option<&ResolvedSecret>,
        model: &str,
        prompt: &str,
        raw_message: &str,
    ) -> AppResult<String> {
        if self.simulation_mode {
            info!(provider = provider.name(), "simulation mode, returning scripted response");
            return Ok(simulated_response(provider.name(), raw_message));
        }

        let Some(resolved) = credential else {
            // Guarded by the caller; kept as a hard stop rather than a panic.
            warn!(provider = provider.name(), "credential vanished between resolve and call");
            return Err(AppError::credential_missing(provider.name()));
        };

        let response = provider
            .get_response(&self.http, &resolved.api_key, Some(model), prompt)
            .await?;

        self.vault.record_usage(resolved.credential_id).await?;
        Ok(response)
    }
}

/// Derive a conversation title from the first message: the first 50
/// characters, with an ellipsis marker when truncated.
fn derive_title(message: &str) -> String {
    let title: String = message.chars().take(TITLE_MAX_CHARS).collect();
    if message.chars().count() > TITLE_MAX_CHARS {
        format!("{title}...")
    } else {
        title
    }
}
