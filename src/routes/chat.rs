// ABOUTME: Chat HTTP routes for sending messages and reading conversations
// ABOUTME: POST /api/chat/message plus read-only conversation listing and fetch
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 FaleComJesus

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::authenticate;
use crate::chat::ChatTurnRequest;
use crate::errors::AppError;
use crate::models::{ConversationRecord, MessageRecord};
use crate::server::ServerResources;

/// Default number of conversations returned by the listing
const DEFAULT_CONVERSATION_LIMIT: i64 = 20;

/// Response for a completed chat turn
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessageResponse {
    /// Bot response text
    pub response: String,
    /// Conversation the exchange was recorded against
    pub conversation_id: i64,
}

/// Query parameters for conversation listing
#[derive(Debug, Deserialize)]
pub struct ListConversationsQuery {
    /// Maximum number of conversations to return
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Conversation listing response
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationListResponse {
    /// Conversations, most recently updated first
    pub conversations: Vec<ConversationRecord>,
}

/// One conversation with its full message history
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationDetailResponse {
    /// The conversation
    pub conversation: ConversationRecord,
    /// Messages in append order
    pub messages: Vec<MessageRecord>,
}

/// Chat routes handler
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create all chat routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/chat/message", post(Self::send_message))
            .route("/api/chat/conversations", get(Self::list_conversations))
            .route(
                "/api/chat/conversations/:conversation_id",
                get(Self::get_conversation),
            )
            .with_state(resources)
    }

    /// Process one chat turn
    async fn send_message(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<ChatTurnRequest>,
    ) -> Result<Json<ChatMessageResponse>, AppError> {
        let user_id = authenticate(&headers, &resources)?;

        let outcome = resources.chat.send_message(user_id, request).await?;

        Ok(Json(ChatMessageResponse {
            response: outcome.response,
            conversation_id: outcome.conversation_id,
        }))
    }

    /// List the user's conversations, most recently updated first
    async fn list_conversations(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<ListConversationsQuery>,
    ) -> Result<Json<ConversationListResponse>, AppError> {
        let user_id = authenticate(&headers, &resources)?;

        let limit = query.limit.unwrap_or(DEFAULT_CONVERSATION_LIMIT).max(1);
        let conversations = resources.database.list_conversations(user_id, limit).await?;

        Ok(Json(ConversationListResponse { conversations }))
    }

    /// Fetch one conversation with its messages
    async fn get_conversation(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<i64>,
    ) -> Result<Json<ConversationDetailResponse>, AppError> {
        let user_id = authenticate(&headers, &resources)?;

        let conversation = resources
            .database
            .get_conversation(conversation_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Conversation"))?;

        let messages = resources.database.list_messages(conversation_id).await?;

        Ok(Json(ConversationDetailResponse {
            conversation,
            messages,
        }))
    }
}
