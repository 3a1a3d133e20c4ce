//! Error taxonomy and retry classification for the auth core.
//!
//! DESIGN
//! ======
//! Validation-shaped failures (wrong password, reused password, untrusted
//! device, token mismatch) are ordinary `Err` values the caller branches
//! on; they never retry. Store I/O is the only retryable class — the retry
//! executor keys on [`ErrorCode::retryable`]. Everything unexpected
//! (missing rows, undecodable bearer tokens, tripped concurrency guards)
//! collapses into [`AuthError::Fatal`], logged in full at the point of
//! classification and opaque to callers.

use crate::crypto::CryptoError;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for errors crossing a retry
/// boundary.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// AUTH ERROR
// =============================================================================

/// Errors surfaced by session/token manager operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown email or wrong password — deliberately indistinguishable.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The proposed password reproduces one of the historical credentials.
    #[error("password was already used")]
    PasswordReused,

    /// Fingerprint trust score fell below the acceptance threshold.
    #[error("untrusted device (score {score})")]
    UntrustedDevice { score: u8 },

    /// Presented refresh token does not match the stored value.
    #[error("refresh token mismatch")]
    TokenMismatch,

    /// Store I/O failure. The only retryable class.
    #[error("store failure: {0}")]
    Store(#[from] sqlx::Error),

    /// Key-material or cipher failure outside the mismatch path.
    #[error("crypto failure: {0}")]
    Crypto(#[from] CryptoError),

    /// Unexpected state. The message is for operators, not callers.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::PasswordReused => "E_PASSWORD_REUSED",
            Self::UntrustedDevice { .. } => "E_UNTRUSTED_DEVICE",
            Self::TokenMismatch => "E_TOKEN_MISMATCH",
            Self::Store(_) => "E_STORE",
            Self::Crypto(_) => "E_CRYPTO",
            Self::Fatal(_) => "E_FATAL",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
