//! Auth configuration parsed from environment variables.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

pub const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 30;
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 30;

/// Errors raised while assembling configuration at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var: {var}")]
    MissingVar { var: &'static str },

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Typed configuration for the session/token manager.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 shared secret for signed tokens.
    pub signing_key: String,
    /// `iss` claim value, enforced on validation.
    pub issuer: String,
    /// `aud` claim value, enforced on validation.
    pub audience: String,
    /// 256-bit key for the transport cipher.
    pub cipher_key: [u8; 32],
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
}

impl AuthConfig {
    /// Build typed auth config from environment variables.
    ///
    /// Required:
    /// - `AUTH_SIGNING_KEY`
    /// - `AUTH_TOKEN_ISSUER`
    /// - `AUTH_TOKEN_AUDIENCE`
    /// - `AUTH_CIPHER_KEY` (base64, exactly 32 bytes)
    ///
    /// Optional:
    /// - `ACCESS_TOKEN_TTL_MINUTES`: default 30
    /// - `REFRESH_TOKEN_TTL_DAYS`: default 30
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is absent or the
    /// cipher key is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let signing_key = require("AUTH_SIGNING_KEY")?;
        let issuer = require("AUTH_TOKEN_ISSUER")?;
        let audience = require("AUTH_TOKEN_AUDIENCE")?;
        let cipher_key = parse_cipher_key(&require("AUTH_CIPHER_KEY")?)?;

        Ok(Self {
            signing_key,
            issuer,
            audience,
            cipher_key,
            access_token_ttl_minutes: env_parse("ACCESS_TOKEN_TTL_MINUTES", DEFAULT_ACCESS_TOKEN_TTL_MINUTES),
            refresh_token_ttl_days: env_parse("REFRESH_TOKEN_TTL_DAYS", DEFAULT_REFRESH_TOKEN_TTL_DAYS),
        })
    }
}

fn require(var: &'static str) -> Result<String, ConfigError> {
    std::env::var(var).map_err(|_| ConfigError::MissingVar { var })
}

fn parse_cipher_key(raw: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = BASE64
        .decode(raw)
        .map_err(|e| ConfigError::Invalid { var: "AUTH_CIPHER_KEY", reason: e.to_string() })?;
    <[u8; 32]>::try_from(bytes).map_err(|b: Vec<u8>| ConfigError::Invalid {
        var: "AUTH_CIPHER_KEY",
        reason: format!("expected 32 bytes, got {}", b.len()),
    })
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
