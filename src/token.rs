//! Signed-token codec — typed claims over HS256.
//!
//! DESIGN
//! ======
//! Claims are a closed struct, not a dynamic claim map: principal and
//! session ids plus the registered iss/aud/iat/exp fields. Strict
//! validation enforces signature, expiry, issuer, and audience. The
//! refresh flow uses an expiry-tolerant decode — an expired access token
//! is exactly what a refresh call presents — but signature, issuer, and
//! audience stay enforced there too.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::config::AuthConfig;
use crate::error::ErrorCode;

/// Typed claim set carried by every signed access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Principal id, stringified.
    pub sub: String,
    /// Session id, stringified.
    pub sid: String,
    pub iss: String,
    pub aud: String,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

// =============================================================================
// ERROR
// =============================================================================

/// Errors from signing or validating access tokens.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token signing failed: {0}")]
    Sign(jsonwebtoken::errors::Error),

    #[error("token validation failed: {0}")]
    Validate(jsonwebtoken::errors::Error),
}

impl ErrorCode for TokenError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Sign(_) => "E_TOKEN_SIGN",
            Self::Validate(_) => "E_TOKEN_VALIDATE",
        }
    }
}

// =============================================================================
// SIGNER
// =============================================================================

/// Signs and validates access tokens with the shared HS256 secret.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl TokenSigner {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.signing_key.as_bytes()),
            decoding: DecodingKey::from_secret(config.signing_key.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl: Duration::minutes(config.access_token_ttl_minutes),
        }
    }

    /// Issue a signed token for a (principal, session) pair with a fresh
    /// expiry window.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Sign`] if encoding fails.
    pub fn issue(&self, principal_id: i64, session_id: i64) -> Result<String, TokenError> {
        let now = OffsetDateTime::now_utc();
        let claims = AccessClaims {
            sub: principal_id.to_string(),
            sid: session_id.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.unix_timestamp(),
            exp: (now + self.ttl).unix_timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(TokenError::Sign)
    }

    /// Strictly validate a token: signature, expiry, issuer, audience.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Validate`] if any check fails.
    pub fn validate(&self, token: &str) -> Result<AccessClaims, TokenError> {
        decode::<AccessClaims>(token, &self.decoding, &self.validation(true))
            .map(|data| data.claims)
            .map_err(TokenError::Validate)
    }

    /// Decode tolerating an expired `exp`. Refresh-flow only.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Validate`] on a bad signature, issuer, or
    /// audience.
    pub fn decode_expired_tolerant(&self, token: &str) -> Result<AccessClaims, TokenError> {
        decode::<AccessClaims>(token, &self.decoding, &self.validation(false))
            .map(|data| data.claims)
            .map_err(TokenError::Validate)
    }

    fn validation(&self, validate_exp: bool) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.validate_exp = validate_exp;
        validation
    }
}

#[cfg(test)]
#[path = "token_test.rs"]
mod tests;
