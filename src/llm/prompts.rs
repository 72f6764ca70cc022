// ABOUTME: Prompt rendering from user message, optional template and conversation context
// ABOUTME: Unresolvable placeholders degrade to a fixed safe wrapper instead of failing the turn
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 FaleComJesus

//! Prompt formatter.
//!
//! Templates are plain text with `{name}` placeholders. The substitution
//! context always carries `message` and is augmented with `user_id`,
//! `conversation_id` and `conversation_history`. A template referencing an
//! unknown placeholder yields a typed [`RenderError`]; the public entry point
//! [`render_or_fallback`] turns that into the fixed minimal wrapper so a
//! malformed custom template never blocks a chat turn.

use std::collections::HashMap;

use thiserror::Error;
use tracing::warn;

use crate::models::MessageSender;

/// Default spiritual-assistant template used when no template is supplied
pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
Você é um assistente espiritual baseado em ensinamentos bíblicos. Seu objetivo é fornecer
orientação, conforto e sabedoria inspirada na Bíblia. Por favor, responda à seguinte
mensagem com uma perspectiva bíblica, citando versículos relevantes quando apropriado:

MENSAGEM DO USUÁRIO: {message}
";

/// Typed template rendering failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    /// Template references a placeholder absent from the context
    #[error("unresolved placeholder '{0}'")]
    UnknownPlaceholder(String),
    /// A `{` or `}` is not paired or escaped
    #[error("unbalanced braces in template")]
    UnbalancedBraces,
}

/// One prior turn used as conversation context
#[derive(Debug, Clone)]
pub struct HistoryTurn {
    /// Message text
    pub content: String,
    /// Who produced it
    pub sender: MessageSender,
}

/// Auxiliary rendering context beyond the message itself
#[derive(Debug, Default)]
pub struct PromptContext {
    /// Requesting user
    pub user_id: Option<i64>,
    /// Conversation the turn belongs to
    pub conversation_id: Option<i64>,
    /// Prior turns in chronological order, excluding the current message
    pub history: Vec<HistoryTurn>,
}

impl PromptContext {
    /// Build the substitution map for a message
    #[must_use]
    pub fn vars(&self, message: &str) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("message".to_owned(), message.to_owned());

        if let Some(user_id) = self.user_id {
            vars.insert("user_id".to_owned(), user_id.to_string());
        }
        if let Some(conversation_id) = self.conversation_id {
            vars.insert("conversation_id".to_owned(), conversation_id.to_string());
        }

        let history = self
            .history
            .iter()
            .map(|turn| format!("{}: {}", turn.sender.as_str(), turn.content))
            .collect::<Vec<_>>()
            .join("\n");
        vars.insert("conversation_history".to_owned(), history);

        vars
    }
}

/// Substitute `{name}` placeholders in a template.
///
/// `{{` and `}}` escape to literal braces.
///
/// # Errors
///
/// Returns an error for an unknown placeholder or unbalanced braces.
pub fn render(template: &str, vars: &HashMap<String, String>) -> Result<String, RenderError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    out.push('{');
                    continue;
                }

                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => name.push(c),
                        None => return Err(RenderError::UnbalancedBraces),
                    }
                }

                match vars.get(&name) {
                    Some(value) => out.push_str(value),
                    None => return Err(RenderError::UnknownPlaceholder(name)),
                }
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(RenderError::UnbalancedBraces);
                }
            }
            c => out.push(c),
        }
    }

    Ok(out)
}

/// Render the final prompt text for a chat turn.
///
/// Uses the default template when none is supplied. A failed render is
/// logged and replaced with the fixed minimal wrapper around the raw
/// message; this function never fails.
#[must_use]
pub fn render_or_fallback(
    message: &str,
    template: Option<&str>,
    context: &PromptContext,
) -> String {
    let template = template.unwrap_or(DEFAULT_PROMPT_TEMPLATE);
    let vars = context.vars(message);

    match render(template, &vars) {
        Ok(prompt) => prompt,
        Err(e) => {
            warn!(error = %e, "template formatting failed, using default wrapper");
            format!("Responda à seguinte mensagem: {message}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_embeds_message() {
        let prompt = render_or_fallback("Estou ansioso", None, &PromptContext::default());
        assert!(prompt.contains("MENSAGEM DO USUÁRIO: Estou ansioso"));
    }

    #[test]
    fn test_custom_template_substitution() {
        let context = PromptContext {
            user_id: Some(7),
            conversation_id: Some(42),
            history: vec![],
        };
        let prompt = render_or_fallback(
            "olá",
            Some("[{conversation_id}/{user_id}] {message}"),
            &context,
        );
        assert_eq!(prompt, "[42/7] olá");
    }

    #[test]
    fn test_unknown_placeholder_falls_back() {
        let prompt = render_or_fallback("hello", Some("{unknown_var}"), &PromptContext::default());
        assert_eq!(prompt, "Responda à seguinte mensagem: hello");
    }

    #[test]
    fn test_unbalanced_braces_fall_back() {
        let prompt = render_or_fallback("oi", Some("quebrado {message"), &PromptContext::default());
        assert_eq!(prompt, "Responda à seguinte mensagem: oi");
    }

    #[test]
    fn test_escaped_braces_are_literal() {
        let rendered = render(
            "{{json}} com {message}",
            &PromptContext::default().vars("x"),
        )
        .unwrap();
        assert_eq!(rendered, "{json} com x");
    }

    #[test]
    fn test_history_is_rendered_in_order() {
        let context = PromptContext {
            user_id: None,
            conversation_id: None,
            history: vec![
                HistoryTurn {
                    content: "primeira".into(),
                    sender: MessageSender::User,
                },
                HistoryTurn {
                    content: "resposta".into(),
                    sender: MessageSender::Bot,
                },
            ],
        };
        let prompt =
            render_or_fallback("x", Some("{conversation_history}"), &context);
        assert_eq!(prompt, "user: primeira\nbot: resposta");
    }
}
