//! Crypto primitives — password hashing, random material, transport cipher.
//!
//! DESIGN
//! ======
//! Password hashing is PBKDF2-HMAC-SHA256 under an externally supplied
//! salt. The function is deterministic for a (password, salt) pair, so a
//! candidate password can be re-hashed under any historical salt and
//! compared by equality; both verification and the reuse check depend on
//! that. The iteration count is fixed — changing it silently invalidates
//! every stored hash.
//!
//! The transport cipher is AES-256-GCM with a per-message random nonce,
//! prepended to the ciphertext before base64 encoding. It keeps refresh
//! tokens and numeric ids opaque in transit; it is not an authentication
//! boundary on its own.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::Rng;
use sha2::Sha256;

use crate::error::ErrorCode;

/// Salt length in bytes, before base64 encoding.
pub const SALT_LEN: usize = 32;

/// Refresh-token value length in bytes, before base64 encoding.
pub const REFRESH_TOKEN_LEN: usize = 64;

/// PBKDF2 iteration count applied to every password hash.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Derived hash length in bytes.
const HASH_LEN: usize = 32;

/// Nonce length for AES-256-GCM (96 bits).
const NONCE_LEN: usize = 12;

const TEMP_PASSWORD_LEN: usize = 12;

/// Alphabet without visually ambiguous characters (no I/O/0/1).
const TEMP_PASSWORD_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by crypto primitives.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Input is not valid base64, is truncated, or is not UTF-8.
    #[error("malformed crypto input: {0}")]
    Decode(String),

    /// The cipher rejected the operation (failed auth tag, bad state).
    #[error("cipher failure: {0}")]
    Cipher(String),

    /// Key material has the wrong shape.
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl ErrorCode for CryptoError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "E_CRYPTO_DECODE",
            Self::Cipher(_) => "E_CRYPTO_CIPHER",
            Self::InvalidKey(_) => "E_CRYPTO_KEY",
        }
    }
}

// =============================================================================
// RANDOM MATERIAL
// =============================================================================

/// Generate a cryptographically random 32-byte salt, base64-encoded.
#[must_use]
pub fn generate_salt() -> String {
    let bytes: [u8; SALT_LEN] = rand::rng().random();
    BASE64.encode(bytes)
}

/// Generate a random 64-byte refresh-token value, base64-encoded.
#[must_use]
pub fn generate_refresh_token_value() -> String {
    let bytes: [u8; REFRESH_TOKEN_LEN] = rand::rng().random();
    BASE64.encode(bytes)
}

/// Generate a temporary password for the reset flow.
#[must_use]
pub fn generate_temporary_password() -> String {
    let mut rng = rand::rng();
    (0..TEMP_PASSWORD_LEN)
        .map(|_| {
            let idx = rng.random_range(0..TEMP_PASSWORD_ALPHABET.len());
            TEMP_PASSWORD_ALPHABET[idx] as char
        })
        .collect()
}

// =============================================================================
// PASSWORD HASHING
// =============================================================================

/// Hash a password under a stored base64 salt.
///
/// # Errors
///
/// Returns [`CryptoError::Decode`] if the salt is not valid base64.
pub fn hash_password(password: &str, salt_b64: &str) -> Result<String, CryptoError> {
    let salt = BASE64
        .decode(salt_b64)
        .map_err(|e| CryptoError::Decode(format!("salt: {e}")))?;

    let mut derived = [0u8; HASH_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut derived);
    Ok(BASE64.encode(derived))
}

// =============================================================================
// TRANSPORT CIPHER
// =============================================================================

/// AES-256-GCM cipher keeping refresh tokens and numeric ids opaque in
/// transit. The key is injected at startup; a fresh nonce is drawn per
/// message.
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    /// Build a cipher from a 256-bit key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if the key is not 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let cipher =
            Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Encrypt a plaintext, returning base64 of `nonce || ciphertext`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Cipher`] if encryption fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::Cipher(e.to_string()))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(nonce.as_slice());
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(&combined))
    }

    /// Decrypt a base64 `nonce || ciphertext` payload back to plaintext.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Decode`] for anything that is not well-formed
    /// base64 of at least nonce length, and [`CryptoError::Cipher`] when
    /// the authentication tag rejects the payload.
    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let combined = BASE64
            .decode(encoded)
            .map_err(|e| CryptoError::Decode(e.to_string()))?;
        let Some((nonce, ciphertext)) = combined.split_first_chunk::<NONCE_LEN>() else {
            return Err(CryptoError::Decode("ciphertext shorter than nonce".into()));
        };

        let plaintext = self
            .cipher
            .decrypt(&Nonce::from(*nonce), ciphertext)
            .map_err(|e| CryptoError::Cipher(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| CryptoError::Decode(e.to_string()))
    }
}

#[cfg(test)]
#[path = "crypto_test.rs"]
mod tests;
