// ABOUTME: Google Gemini generateContent provider
// ABOUTME: Key travels as a URL query parameter; contents/parts request, candidates envelope
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 FaleComJesus

//! # Google Gemini Provider
//!
//! The generateContent API authenticates with a `key` query parameter
//! instead of a header, nests text under `contents[].parts[]`, and returns
//! the completion at `candidates[0].content.parts[0].text`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{LlmProvider, ProviderRequest, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::errors::{AppError, AppResult};

const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-pro";

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<Part>,
}

/// Google Gemini generateContent provider
pub struct GoogleProvider;

impl GoogleProvider {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for GoogleProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn display_name(&self) -> &str {
        "Google Gemini"
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    fn render_request(&self, api_key: &str, model: &str, prompt: &str) -> ProviderRequest {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_owned(),
                parts: vec![Part {
                    text: prompt.to_owned(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: DEFAULT_TEMPERATURE,
                max_output_tokens: DEFAULT_MAX_TOKENS,
            },
        };

        ProviderRequest {
            url: format!("{API_BASE_URL}/{model}:generateContent?key={api_key}"),
            headers: vec![],
            body: serde_json::to_value(body).unwrap_or_default(),
        }
    }

    fn parse_response(&self, body: &Value) -> AppResult<String> {
        let parsed: GenerateContentResponse =
            serde_json::from_value(body.clone()).map_err(|e| {
                AppError::external_service("google", format!("unexpected response shape: {e}"))
            })?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text.trim().to_owned())
            .ok_or_else(|| AppError::external_service("google", "response contained no candidates"))
    }
}
