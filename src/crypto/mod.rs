// ABOUTME: Symmetric encryption of per-user provider API keys at rest
// ABOUTME: AES-256-CBC with PKCS#7 padding, stored as base64(IV || ciphertext)
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 FaleComJesus

//! Credential encryption engine.
//!
//! Secrets are persisted as `base64(IV(16) || ciphertext)` where the
//! ciphertext is the PKCS#7-padded plaintext encrypted with AES-256-CBC.
//! The key comes from `API_ENCRYPTION_KEY` (base64, exactly 32 bytes) or, as
//! a development-only fallback, is derived from the application secret by
//! space-padding/truncating its UTF-8 bytes to 32 bytes. The fallback keeps
//! existing development databases readable; production deployments must set
//! an explicit key.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use tracing::warn;

use crate::errors::{AppError, ErrorCode};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES block size in bytes; also the IV length
const BLOCK_SIZE: usize = 16;

/// Typed failures of the encryption engine
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Configured key is not valid base64 or not 256 bits
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),
    /// Refusing to encrypt an empty secret; absence must stay absence
    #[error("refusing to encrypt an empty secret")]
    EmptyPlaintext,
    /// Stored blob is not valid base64
    #[error("encrypted secret is not valid base64: {0}")]
    InvalidEncoding(String),
    /// Stored blob is too short or the ciphertext is not block-aligned
    #[error("encrypted secret has invalid length {0}")]
    InvalidLength(usize),
    /// Padding validation failed after decryption (wrong key, tampered or
    /// corrupted data, or the key was rotated without re-encrypting)
    #[error("padding validation failed: wrong key or corrupted ciphertext")]
    BadPadding,
    /// Decrypted bytes are not valid UTF-8
    #[error("decrypted secret is not valid UTF-8")]
    InvalidUtf8,
}

impl From<CryptoError> for AppError {
    fn from(error: CryptoError) -> Self {
        match error {
            CryptoError::InvalidKey(_) => Self::new(ErrorCode::ConfigError, error.to_string()),
            CryptoError::EmptyPlaintext => {
                Self::new(ErrorCode::InvalidInput, error.to_string())
            }
            _ => Self::decryption_failed(error.to_string()),
        }
    }
}

/// Symmetric cipher over the process-wide credential encryption key.
///
/// The key is established at startup and read-only afterwards.
pub struct SecretCipher {
    key: [u8; 32],
}

impl SecretCipher {
    /// Create a cipher from raw key bytes - primarily for testing
    #[must_use]
    pub const fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Resolve the encryption key from configuration.
    ///
    /// An explicit base64-encoded 256-bit key takes precedence. Without one,
    /// the key is derived from the master secret by left-justifying its UTF-8
    /// bytes to exactly 32 bytes (padded with spaces, truncated if longer).
    ///
    /// # Errors
    ///
    /// Returns an error if the explicit key is not valid base64 or does not
    /// decode to exactly 32 bytes.
    pub fn from_config(
        explicit_key_b64: Option<&str>,
        master_secret: &str,
    ) -> Result<Self, CryptoError> {
        if let Some(encoded) = explicit_key_b64 {
            let key_bytes = general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| CryptoError::InvalidKey(format!("invalid base64: {e}")))?;

            if key_bytes.len() != 32 {
                return Err(CryptoError::InvalidKey(format!(
                    "expected 32 bytes, got {}",
                    key_bytes.len()
                )));
            }

            let mut key = [0u8; 32];
            key.copy_from_slice(&key_bytes);
            return Ok(Self { key });
        }

        warn!(
            "API_ENCRYPTION_KEY not set, deriving credential key from SECRET_KEY - \
             NOT SECURE FOR PRODUCTION"
        );
        Ok(Self {
            key: derive_key_from_secret(master_secret),
        })
    }

    /// Encrypt a plaintext secret.
    ///
    /// Returns `base64(IV || ciphertext)` with a fresh random 16-byte IV.
    ///
    /// # Errors
    ///
    /// Returns an error for empty input; "no secret" is absence, not an
    /// encryption target.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        if plaintext.is_empty() {
            return Err(CryptoError::EmptyPlaintext);
        }

        let mut iv = [0u8; BLOCK_SIZE];
        OsRng.fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        let mut blob = Vec::with_capacity(BLOCK_SIZE + ciphertext.len());
        blob.extend_from_slice(&iv);
        blob.extend_from_slice(&ciphertext);

        Ok(general_purpose::STANDARD.encode(blob))
    }

    /// Decrypt a secret produced by [`Self::encrypt`].
    ///
    /// # Errors
    ///
    /// Fails when the base64 is malformed, the ciphertext is not a non-empty
    /// multiple of the block size, padding is invalid after decryption, or
    /// the plaintext is not UTF-8. Tampered ciphertext is rejected rather
    /// than silently returning corrupted text.
    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let blob = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;

        if blob.len() < 2 * BLOCK_SIZE || (blob.len() - BLOCK_SIZE) % BLOCK_SIZE != 0 {
            return Err(CryptoError::InvalidLength(blob.len()));
        }

        let mut iv = [0u8; BLOCK_SIZE];
        iv.copy_from_slice(&blob[..BLOCK_SIZE]);
        let ciphertext = &blob[BLOCK_SIZE..];

        let plaintext = Aes256CbcDec::new(&self.key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CryptoError::BadPadding)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
    }
}

/// Derive a 32-byte key from the master secret: UTF-8 bytes left-justified to
/// 32 bytes, space-padded if shorter, truncated if longer.
fn derive_key_from_secret(secret: &str) -> [u8; 32] {
    let mut bytes = secret.as_bytes().to_vec();
    bytes.resize(32, b' ');

    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes[..32]);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> SecretCipher {
        SecretCipher::from_bytes([7u8; 32])
    }

    #[test]
    fn test_round_trip() {
        let cipher = test_cipher();
        for secret in ["sk-abc123", "x", "chave com acentuação é ü", "trailing  "] {
            let encrypted = cipher.encrypt(secret).unwrap();
            assert_eq!(cipher.decrypt(&encrypted).unwrap(), secret);
        }
    }

    #[test]
    fn test_blob_layout() {
        let cipher = test_cipher();
        let encrypted = cipher.encrypt("sk-abc123").unwrap();
        let blob = general_purpose::STANDARD.decode(&encrypted).unwrap();

        // IV plus one padded block for a short secret
        assert_eq!(blob.len(), 32);
    }

    #[test]
    fn test_unique_ivs() {
        let cipher = test_cipher();
        let a = cipher.encrypt("same secret").unwrap();
        let b = cipher.encrypt("same secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_plaintext_rejected() {
        let cipher = test_cipher();
        assert!(matches!(
            cipher.encrypt(""),
            Err(CryptoError::EmptyPlaintext)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let cipher = test_cipher();
        let encrypted = cipher.encrypt("sk-abc123").unwrap();
        let mut blob = general_purpose::STANDARD.decode(&encrypted).unwrap();

        // Flip a byte in the final ciphertext block; padding validation must
        // reject it instead of returning corrupted plaintext.
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        let tampered = general_purpose::STANDARD.encode(&blob);

        assert!(matches!(
            cipher.decrypt(&tampered),
            Err(CryptoError::BadPadding | CryptoError::InvalidUtf8)
        ));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let cipher = test_cipher();
        let other = SecretCipher::from_bytes([8u8; 32]);
        let encrypted = cipher.encrypt("sk-abc123").unwrap();

        assert!(matches!(
            other.decrypt(&encrypted),
            Err(CryptoError::BadPadding | CryptoError::InvalidUtf8)
        ));
    }

    #[test]
    fn test_malformed_base64_rejected() {
        let cipher = test_cipher();
        assert!(matches!(
            cipher.decrypt("not//valid??base64!!"),
            Err(CryptoError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_ragged_length_rejected() {
        let cipher = test_cipher();
        let short = general_purpose::STANDARD.encode([0u8; 17]);
        assert!(matches!(
            cipher.decrypt(&short),
            Err(CryptoError::InvalidLength(17))
        ));
    }

    #[test]
    fn test_derived_key_pads_and_truncates() {
        let short = derive_key_from_secret("abc");
        assert_eq!(&short[..3], b"abc");
        assert!(short[3..].iter().all(|&b| b == b' '));

        let long_secret = "a".repeat(40);
        let long = derive_key_from_secret(&long_secret);
        assert_eq!(long, [b'a'; 32]);
    }

    #[test]
    fn test_explicit_key_must_be_256_bits() {
        let short_key = general_purpose::STANDARD.encode([1u8; 16]);
        assert!(matches!(
            SecretCipher::from_config(Some(&short_key), "ignored"),
            Err(CryptoError::InvalidKey(_))
        ));

        let good_key = general_purpose::STANDARD.encode([1u8; 32]);
        assert!(SecretCipher::from_config(Some(&good_key), "ignored").is_ok());
    }

    #[test]
    fn test_explicit_key_and_derived_key_interoperate() {
        // A blob written under the derived key stays readable when the same
        // key is later supplied explicitly.
        let derived = SecretCipher::from_config(None, "my master secret").unwrap();
        let explicit_b64 =
            general_purpose::STANDARD.encode(derive_key_from_secret("my master secret"));
        let explicit = SecretCipher::from_config(Some(&explicit_b64), "other").unwrap();

        let encrypted = derived.encrypt("sk-abc123").unwrap();
        assert_eq!(explicit.decrypt(&encrypted).unwrap(), "sk-abc123");
    }
}
