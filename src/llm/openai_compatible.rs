// ABOUTME: OpenAI-shaped chat completions provider serving OpenAI, Mistral and unknown hosts
// ABOUTME: Bearer auth, system plus user turns, choices[0].message.content envelope
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 FaleComJesus

//! # OpenAI-Compatible Provider
//!
//! One implementation covers every provider that speaks the
//! `/chat/completions` wire format: OpenAI itself, Mistral, and the generic
//! fallback for unknown provider names. The generic variant parses leniently;
//! a body that does not match the envelope is returned as raw JSON text
//! instead of an error, since unknown hosts make no shape guarantee.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{LlmProvider, ProviderRequest, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::errors::{AppError, AppResult};

/// System turn prepended to every OpenAI-shaped request
const SYSTEM_MESSAGE: &str =
    "Você é um assistente espiritual que oferece orientação baseada na Bíblia.";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
}

/// Provider speaking the OpenAI chat completions format
pub struct OpenAiCompatibleProvider {
    name: String,
    display_name: String,
    base_url: String,
    default_model: String,
    lenient_parse: bool,
}

impl OpenAiCompatibleProvider {
    /// OpenAI itself
    #[must_use]
    pub fn openai() -> Self {
        Self {
            name: "openai".to_owned(),
            display_name: "OpenAI".to_owned(),
            base_url: "https://api.openai.com/v1".to_owned(),
            default_model: "gpt-3.5-turbo".to_owned(),
            lenient_parse: false,
        }
    }

    /// Mistral, whose API is OpenAI-shaped
    #[must_use]
    pub fn mistral() -> Self {
        Self {
            name: "mistral".to_owned(),
            display_name: "Mistral".to_owned(),
            base_url: "https://api.mistral.ai/v1".to_owned(),
            default_model: "mistral-medium".to_owned(),
            lenient_parse: false,
        }
    }

    /// Generic fallback for an unknown provider name.
    ///
    /// Assumes `https://api.{name}.com/v1` and lenient response parsing.
    #[must_use]
    pub fn generic(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        Self {
            base_url: format!("https://api.{name}.com/v1"),
            default_model: "gpt-3.5-turbo".to_owned(),
            lenient_parse: true,
            display_name: name.clone(),
            name,
        }
    }

    /// Provider pointed at a self-hosted OpenAI-compatible endpoint
    /// (Ollama, vLLM, a gateway). Strict envelope parsing.
    #[must_use]
    pub fn custom(name: &str, base_url: &str) -> Self {
        let name = name.to_ascii_lowercase();
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            default_model: "gpt-3.5-turbo".to_owned(),
            lenient_parse: false,
            display_name: name.clone(),
            name,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn render_request(&self, api_key: &str, model: &str, prompt: &str) -> ProviderRequest {
        let body = ChatCompletionRequest {
            model: model.to_owned(),
            messages: vec![
                WireMessage {
                    role: "system".to_owned(),
                    content: SYSTEM_MESSAGE.to_owned(),
                },
                WireMessage {
                    role: "user".to_owned(),
                    content: prompt.to_owned(),
                },
            ],
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        };

        ProviderRequest {
            url: format!("{}/chat/completions", self.base_url),
            headers: vec![("Authorization", format!("Bearer {api_key}"))],
            body: serde_json::to_value(body).unwrap_or_default(),
        }
    }

    fn parse_response(&self, body: &Value) -> AppResult<String> {
        match serde_json::from_value::<ChatCompletionResponse>(body.clone()) {
            Ok(parsed) => match parsed.choices.into_iter().next() {
                Some(choice) => Ok(choice.message.content.trim().to_owned()),
                None if self.lenient_parse => Ok(body.to_string()),
                None => Err(AppError::external_service(
                    self.name.clone(),
                    "response contained no choices",
                )),
            },
            // Unknown hosts make no envelope guarantee; hand the caller the
            // raw body rather than failing the turn.
            Err(_) if self.lenient_parse => Ok(body.to_string()),
            Err(e) => Err(AppError::external_service(
                self.name.clone(),
                format!("unexpected response shape: {e}"),
            )),
        }
    }
}
