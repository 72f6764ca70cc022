// ABOUTME: SQLite persistence layer for users, credentials, conversations and templates
// ABOUTME: Owns schema creation and all queries; usage counters increment atomically in SQL
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 FaleComJesus

//! SQLite store backed by sqlx.
//!
//! All queries are runtime-bound. Credential usage accounting is a single
//! `UPDATE ... SET use_count = use_count + 1` statement so concurrent chat
//! turns on the same credential never lose increments.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::errors::AppResult;
use crate::models::{
    ConversationRecord, CredentialRecord, MessageRecord, MessageSender, PromptTemplateRecord,
};

/// Database handle; cheap to clone, shares one connection pool
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the database and ensure the schema exists
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the connection fails, or
    /// schema creation fails.
    pub async fn connect(url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // An in-memory database exists per connection; a single pooled
        // connection keeps the schema visible across queries.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    async fn init_schema(&self) -> AppResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS api_keys (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                provider TEXT NOT NULL,
                key_encrypted TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                last_used TEXT,
                use_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                title TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL REFERENCES conversations(id),
                content TEXT NOT NULL,
                sender TEXT NOT NULL,
                metadata TEXT,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS prompt_templates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                template TEXT NOT NULL,
                is_system INTEGER NOT NULL DEFAULT 0,
                user_id INTEGER REFERENCES users(id)
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ========================================================================
    // Users
    // ========================================================================

    /// Create a user, returning its id
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (e.g. duplicate email).
    pub async fn create_user(&self, email: &str) -> AppResult<i64> {
        let result = sqlx::query("INSERT INTO users (email, created_at) VALUES (?, ?)")
            .bind(email)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Check whether a user exists
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn user_exists(&self, user_id: i64) -> AppResult<bool> {
        let row = sqlx::query("SELECT 1 FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    // ========================================================================
    // Credentials
    // ========================================================================

    /// Fetch the active credential for a (user, provider) pair
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_active_credential(
        &self,
        user_id: i64,
        provider: &str,
    ) -> AppResult<Option<CredentialRecord>> {
        let row = sqlx::query(
            "SELECT id, user_id, provider, key_encrypted, is_active, last_used,
                    use_count, created_at, updated_at
             FROM api_keys
             WHERE user_id = ? AND provider = ? AND is_active = 1",
        )
        .bind(user_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(credential_from_row).transpose()
    }

    /// Insert a new credential row and return it
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert_credential(
        &self,
        user_id: i64,
        provider: &str,
        key_encrypted: &str,
    ) -> AppResult<CredentialRecord> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO api_keys
                 (user_id, provider, key_encrypted, is_active, use_count, created_at, updated_at)
             VALUES (?, ?, ?, 1, 0, ?, ?)",
        )
        .bind(user_id)
        .bind(provider)
        .bind(key_encrypted)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(CredentialRecord {
            id: result.last_insert_rowid(),
            user_id,
            provider: provider.to_owned(),
            key_encrypted: key_encrypted.to_owned(),
            is_active: true,
            last_used: None,
            use_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace the encrypted secret of an existing credential and reactivate it
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn replace_credential_secret(
        &self,
        credential_id: i64,
        key_encrypted: &str,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE api_keys SET key_encrypted = ?, is_active = 1, updated_at = ? WHERE id = ?",
        )
        .bind(key_encrypted)
        .bind(Utc::now())
        .bind(credential_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record one successful use of a credential.
    ///
    /// The counter increments inside the statement; concurrent requests for
    /// the same credential never lose updates.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn record_credential_usage(&self, credential_id: i64) -> AppResult<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE api_keys
             SET use_count = use_count + 1, last_used = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(now)
        .bind(now)
        .bind(credential_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete a credential owned by the given user.
    ///
    /// Returns `false` when the row does not exist or belongs to another
    /// user; the two cases are indistinguishable to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_credential(&self, user_id: i64, credential_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = ? AND user_id = ?")
            .bind(credential_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List all credentials owned by a user, ordered by provider
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_credentials(&self, user_id: i64) -> AppResult<Vec<CredentialRecord>> {
        let rows = sqlx::query(
            "SELECT id, user_id, provider, key_encrypted, is_active, last_used,
                    use_count, created_at, updated_at
             FROM api_keys
             WHERE user_id = ?
             ORDER BY provider",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(credential_from_row).collect()
    }

    // ========================================================================
    // Conversations
    // ========================================================================

    /// Create a conversation for a user
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create_conversation(
        &self,
        user_id: i64,
        title: &str,
    ) -> AppResult<ConversationRecord> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO conversations (user_id, title, created_at, updated_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(title)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(ConversationRecord {
            id: result.last_insert_rowid(),
            user_id,
            title: title.to_owned(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Fetch a conversation scoped to its owner
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_conversation(
        &self,
        conversation_id: i64,
        user_id: i64,
    ) -> AppResult<Option<ConversationRecord>> {
        let row = sqlx::query(
            "SELECT id, user_id, title, created_at, updated_at
             FROM conversations
             WHERE id = ? AND user_id = ?",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(conversation_from_row).transpose()
    }

    /// List a user's conversations, most recently updated first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_conversations(
        &self,
        user_id: i64,
        limit: i64,
    ) -> AppResult<Vec<ConversationRecord>> {
        let rows = sqlx::query(
            "SELECT id, user_id, title, created_at, updated_at
             FROM conversations
             WHERE user_id = ?
             ORDER BY updated_at DESC
             LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(conversation_from_row).collect()
    }

    // ========================================================================
    // Messages
    // ========================================================================

    /// Append a message to a conversation and bump its updated timestamp
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn append_message(
        &self,
        conversation_id: i64,
        content: &str,
        sender: MessageSender,
        metadata: Option<&serde_json::Value>,
    ) -> AppResult<MessageRecord> {
        let now = Utc::now();
        let metadata_text = metadata.map(serde_json::Value::to_string);

        let result = sqlx::query(
            "INSERT INTO messages (conversation_id, content, sender, metadata, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(conversation_id)
        .bind(content)
        .bind(sender.as_str())
        .bind(metadata_text.as_deref())
        .bind(now)
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;

        Ok(MessageRecord {
            id: result.last_insert_rowid(),
            conversation_id,
            content: content.to_owned(),
            sender,
            metadata: metadata.cloned(),
            created_at: now,
        })
    }

    /// List all messages of a conversation in append order
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_messages(&self, conversation_id: i64) -> AppResult<Vec<MessageRecord>> {
        let rows = sqlx::query(
            "SELECT id, conversation_id, content, sender, metadata, created_at
             FROM messages
             WHERE conversation_id = ?
             ORDER BY created_at, id",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }

    // ========================================================================
    // Prompt templates
    // ========================================================================

    /// Fetch a prompt template by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_template(
        &self,
        template_id: i64,
    ) -> AppResult<Option<PromptTemplateRecord>> {
        let row = sqlx::query(
            "SELECT id, name, template, is_system, user_id
             FROM prompt_templates
             WHERE id = ?",
        )
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(template_from_row).transpose()
    }

    /// Insert the default system template when no system template exists yet
    ///
    /// # Errors
    ///
    /// Returns an error if the check or the insert fails.
    pub async fn seed_system_template(&self, name: &str, template: &str) -> AppResult<()> {
        let existing = sqlx::query("SELECT 1 FROM prompt_templates WHERE is_system = 1 LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        if existing.is_none() {
            self.insert_template(name, template, true, None).await?;
        }
        Ok(())
    }

    /// Insert a prompt template, returning its id
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert_template(
        &self,
        name: &str,
        template: &str,
        is_system: bool,
        user_id: Option<i64>,
    ) -> AppResult<i64> {
        let result = sqlx::query(
            "INSERT INTO prompt_templates (name, template, is_system, user_id)
             VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(template)
        .bind(is_system)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn credential_from_row(row: &SqliteRow) -> AppResult<CredentialRecord> {
    Ok(CredentialRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        provider: row.try_get("provider")?,
        key_encrypted: row.try_get("key_encrypted")?,
        is_active: row.try_get("is_active")?,
        last_used: row.try_get::<Option<DateTime<Utc>>, _>("last_used")?,
        use_count: row.try_get("use_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn conversation_from_row(row: &SqliteRow) -> AppResult<ConversationRecord> {
    Ok(ConversationRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn template_from_row(row: &SqliteRow) -> AppResult<PromptTemplateRecord> {
    Ok(PromptTemplateRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        template: row.try_get("template")?,
        is_system: row.try_get("is_system")?,
        user_id: row.try_get::<Option<i64>, _>("user_id")?,
    })
}

fn message_from_row(row: &SqliteRow) -> AppResult<MessageRecord> {
    let sender_raw: String = row.try_get("sender")?;
    let sender = MessageSender::parse_str(&sender_raw)
        .ok_or_else(|| crate::errors::AppError::database(format!("unknown sender '{sender_raw}'")))?;

    let metadata_text: Option<String> = row.try_get("metadata")?;
    let metadata = metadata_text
        .as_deref()
        .and_then(|text| serde_json::from_str(text).ok());

    Ok(MessageRecord {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        content: row.try_get("content")?,
        sender,
        metadata,
        created_at: row.try_get("created_at")?,
    })
}
