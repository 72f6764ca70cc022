// ABOUTME: Anthropic messages API provider
// ABOUTME: x-api-key header auth, single user turn, content[0].text envelope
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 FaleComJesus

//! # Anthropic Provider
//!
//! The messages API differs from the OpenAI shape on every axis that
//! matters here: the key travels in `x-api-key` with a pinned
//! `anthropic-version`, there is no system role in the message list, and
//! the completion text lives at `content[0].text`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{LlmProvider, ProviderRequest, DEFAULT_MAX_TOKENS};
use crate::errors::{AppError, AppResult};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: String,
}

/// Anthropic messages API provider
pub struct AnthropicProvider;

impl AnthropicProvider {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for AnthropicProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn display_name(&self) -> &str {
        "Anthropic"
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    fn render_request(&self, api_key: &str, model: &str, prompt: &str) -> ProviderRequest {
        let body = MessagesRequest {
            model: model.to_owned(),
            messages: vec![WireMessage {
                role: "user".to_owned(),
                content: prompt.to_owned(),
            }],
            max_tokens: DEFAULT_MAX_TOKENS,
        };

        ProviderRequest {
            url: API_URL.to_owned(),
            headers: vec![
                ("x-api-key", api_key.to_owned()),
                ("anthropic-version", API_VERSION.to_owned()),
            ],
            body: serde_json::to_value(body).unwrap_or_default(),
        }
    }

    fn parse_response(&self, body: &Value) -> AppResult<String> {
        let parsed: MessagesResponse = serde_json::from_value(body.clone()).map_err(|e| {
            AppError::external_service("anthropic", format!("unexpected response shape: {e}"))
        })?;

        parsed
            .content
            .into_iter()
            .next()
            .map(|block| block.text.trim().to_owned())
            .ok_or_else(|| AppError::external_service("anthropic", "response contained no content"))
    }
}
