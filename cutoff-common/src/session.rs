//! Admin session cookie encryption
//!
//! The session cookie carries a small JSON payload (`{username, role,
//! issuedAt}`) encrypted with AES-256-GCM. The key is the SHA-256 digest of
//! the configured secret. Cookie value format: base64url(`<12-byte nonce>
//! <ciphertext+tag>`), no padding.
//!
//! This module holds only the pure encoding/decoding logic. Cookie headers
//! and middleware live in the server crate.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;

/// Cookie name for the admin session
pub const SESSION_COOKIE_NAME: &str = "admin_session";

/// Nonce size for AES-256-GCM (96 bits = 12 bytes)
const NONCE_SIZE: usize = 12;

/// Session decoding/encoding errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Malformed session cookie: {0}")]
    Malformed(String),

    #[error("Session cookie failed to decrypt")]
    Decryption,

    #[error("Session cookie could not be encrypted")]
    Encryption,

    #[error("Session expired")]
    Expired,
}

/// Role carried by the admin session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
}

/// Decrypted session payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSession {
    pub username: String,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
}

impl AdminSession {
    /// New admin session issued now
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            role: Role::Admin,
            issued_at: Utc::now(),
        }
    }
}

/// Encrypts and decrypts session cookies
#[derive(Clone)]
pub struct SessionCodec {
    cipher: Aes256Gcm,
    max_age: Duration,
}

impl SessionCodec {
    /// Build a codec from a secret of any length
    pub fn new(secret: &str, max_age: Duration) -> Self {
        let key = Sha256::digest(secret.as_bytes());
        Self {
            cipher: Aes256Gcm::new(&key),
            max_age,
        }
    }

    /// Session lifetime, also used as the cookie Max-Age
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Encrypt a session into a cookie value
    pub fn encode(&self, session: &AdminSession) -> Result<String, SessionError> {
        let plaintext =
            serde_json::to_vec(session).map_err(|e| SessionError::Malformed(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|_| SessionError::Encryption)?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend(ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(combined))
    }

    /// Decrypt and validate a cookie value
    ///
    /// Rejects tampered and foreign-key cookies, payloads with a role other
    /// than admin, and expired or future-dated sessions.
    pub fn decode(&self, value: &str) -> Result<AdminSession, SessionError> {
        let combined = URL_SAFE_NO_PAD
            .decode(value.trim())
            .map_err(|e| SessionError::Malformed(e.to_string()))?;
        if combined.len() <= NONCE_SIZE {
            return Err(SessionError::Malformed("value too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| SessionError::Decryption)?;

        let session: AdminSession = serde_json::from_slice(&plaintext)
            .map_err(|e| SessionError::Malformed(e.to_string()))?;

        let age = Utc::now().signed_duration_since(session.issued_at);
        let max_age = chrono::Duration::from_std(self.max_age)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        // Small allowance for clock skew on future-dated cookies
        if age > max_age || age < chrono::Duration::seconds(-5) {
            return Err(SessionError::Expired);
        }

        Ok(session)
    }
}

/// Random 32-byte secret, base64url encoded
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Constant-time comparison for credentials
pub fn credentials_match(provided: &str, expected: &str) -> bool {
    let a = Sha256::digest(provided.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
