// ABOUTME: Credential vault associating one active encrypted secret per (user, provider)
// ABOUTME: Encrypts on store, decrypts on demand, degrades to absence when decryption fails
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 FaleComJesus

//! Credential store adapter.
//!
//! Storing a secret for a (user, provider) pair that already has an active
//! credential replaces the secret in place and reactivates the row; the
//! uniqueness invariant is enforced here, not by the schema. A stored secret
//! that can no longer be decrypted (key rotated without re-encrypting,
//! corrupted row) is reported as absent with a warning so the chat flow can
//! fall back to simulation mode where configured.

use std::sync::Arc;

use tracing::{info, warn};

use crate::crypto::SecretCipher;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::CredentialSummary;

/// Outcome of a store operation: whether an existing credential was replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// A new credential row was created
    Created,
    /// The existing (user, provider) credential was updated in place
    Updated,
}

/// A decrypted secret together with the credential row it came from
#[derive(Debug)]
pub struct ResolvedSecret {
    /// Credential row id, for usage bookkeeping
    pub credential_id: i64,
    /// The decrypted provider API key
    pub api_key: String,
}

/// Vault over encrypted per-user provider credentials
#[derive(Clone)]
pub struct CredentialVault {
    db: Database,
    cipher: Arc<SecretCipher>,
}

impl CredentialVault {
    /// Create a vault over the given store and cipher
    #[must_use]
    pub fn new(db: Database, cipher: Arc<SecretCipher>) -> Self {
        Self { db, cipher }
    }

    /// Store a secret for a (user, provider) pair.
    ///
    /// Replaces and reactivates the existing active credential when present;
    /// otherwise creates a new one. Returns the credential metadata (never
    /// the plaintext) and whether it was created or updated.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or the database write fails.
    pub async fn set_credential(
        &self,
        user_id: i64,
        provider: &str,
        plaintext_secret: &str,
    ) -> AppResult<(CredentialSummary, StoreOutcome)> {
        let encrypted = self.cipher.encrypt(plaintext_secret)?;

        if let Some(existing) = self.db.get_active_credential(user_id, provider).await? {
            self.db
                .replace_credential_secret(existing.id, &encrypted)
                .await?;
            info!(user_id, provider, "replaced existing credential");

            // Re-read the row so the summary carries the updated timestamp
            // the write just set, not the pre-update one.
            let updated = self
                .db
                .get_active_credential(user_id, provider)
                .await?
                .ok_or_else(|| AppError::internal("credential disappeared during update"))?;
            return Ok((CredentialSummary::from(&updated), StoreOutcome::Updated));
        }

        let created = self
            .db
            .insert_credential(user_id, provider, &encrypted)
            .await?;
        info!(user_id, provider, "stored new credential");

        Ok((CredentialSummary::from(&created), StoreOutcome::Created))
    }

    /// Resolve the decrypted secret for a (user, provider) pair.
    ///
    /// Returns `None` when no active credential exists or the stored secret
    /// cannot be decrypted; the latter is logged at warning level and never
    /// surfaced to callers as an error.
    ///
    /// # Errors
    ///
    /// Returns an error only for database failures.
    pub async fn decrypted_secret(
        &self,
        user_id: i64,
        provider: &str,
    ) -> AppResult<Option<ResolvedSecret>> {
        let Some(record) = self.db.get_active_credential(user_id, provider).await? else {
            return Ok(None);
        };

        match self.cipher.decrypt(&record.key_encrypted) {
            Ok(api_key) => Ok(Some(ResolvedSecret {
                credential_id: record.id,
                api_key,
            })),
            Err(e) => {
                warn!(
                    user_id,
                    provider,
                    credential_id = record.id,
                    error = %e,
                    "stored credential is unusable, treating as absent"
                );
                Ok(None)
            }
        }
    }

    /// Record one successful use of a credential
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn record_usage(&self, credential_id: i64) -> AppResult<()> {
        self.db.record_credential_usage(credential_id).await
    }

    /// Delete a credential owned by the given user.
    ///
    /// Returns `false` for a missing or foreign credential; callers map both
    /// to the same not-found response.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_credential(&self, user_id: i64, credential_id: i64) -> AppResult<bool> {
        self.db.delete_credential(user_id, credential_id).await
    }

    /// List credential metadata for a user
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_credentials(&self, user_id: i64) -> AppResult<Vec<CredentialSummary>> {
        let records = self.db.list_credentials(user_id).await?;
        Ok(records.iter().map(CredentialSummary::from).collect())
    }
}
