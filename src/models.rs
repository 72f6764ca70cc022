// ABOUTME: Persistence records for credentials, conversations, messages and prompt templates
// ABOUTME: Plain structs mapped to database rows plus their API-facing summary shapes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 FaleComJesus

//! Data model records shared between the store and the HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One user's encrypted secret for one LLM provider.
///
/// At most one active credential exists per (user, provider) pair; storing a
/// second secret for the same provider replaces the existing row in place.
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    /// Row id
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Provider name ("openai", "anthropic", "google", "mistral", ...)
    pub provider: String,
    /// Encrypted secret as base64(IV || ciphertext); never leaves the store
    pub key_encrypted: String,
    /// Whether this credential is usable
    pub is_active: bool,
    /// Timestamp of the most recent successful outbound call
    pub last_used: Option<DateTime<Utc>>,
    /// Number of successful outbound calls made with this credential
    pub use_count: i64,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

/// Credential metadata for listing; the secret is never serialized
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialSummary {
    /// Row id
    pub id: i64,
    /// Provider name
    pub provider: String,
    /// Whether this credential is usable
    pub is_active: bool,
    /// Timestamp of the most recent successful outbound call
    pub last_used: Option<DateTime<Utc>>,
    /// Number of successful outbound calls
    pub use_count: i64,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl From<&CredentialRecord> for CredentialSummary {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            id: record.id,
            provider: record.provider.clone(),
            is_active: record.is_active,
            last_used: record.last_used,
            use_count: record.use_count,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// An ordered, append-only sequence of user/bot turns owned by one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Row id
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Title, derived from the first message when not supplied
    pub title: String,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSender {
    /// The human user
    User,
    /// The assistant response
    Bot,
}

impl MessageSender {
    /// String representation stored in the database
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }

    /// Parse the stored representation
    #[must_use]
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "bot" => Some(Self::Bot),
            _ => None,
        }
    }
}

/// One turn in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Row id
    pub id: i64,
    /// Conversation this turn belongs to
    pub conversation_id: i64,
    /// Message text
    pub content: String,
    /// Who produced the message
    pub sender: MessageSender,
    /// Response metadata for bot turns ({provider, model, regenerated})
    pub metadata: Option<serde_json::Value>,
    /// Created timestamp; append order within a conversation
    pub created_at: DateTime<Utc>,
}

/// Reusable prompt pattern with a `{message}` placeholder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplateRecord {
    /// Row id
    pub id: i64,
    /// Display name
    pub name: String,
    /// Template text
    pub template: String,
    /// System templates are shared with every user
    pub is_system: bool,
    /// Owner for private templates; `None` for system templates
    pub user_id: Option<i64>,
}

impl PromptTemplateRecord {
    /// Whether the given user may use this template
    #[must_use]
    pub fn accessible_by(&self, user_id: i64) -> bool {
        self.is_system || self.user_id == Some(user_id)
    }
}
