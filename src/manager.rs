//! Session/token manager — login, password rotation, refresh, reset, logout.
//!
//! ARCHITECTURE
//! ============
//! The manager is the sole writer of credential, session, session-event,
//! and refresh-token rows. Each operation validates against current state
//! first, pre-builds every row it intends to write, then commits them in
//! one retry-guarded transaction spanning both logical stores. Signed
//! tokens are minted only after the transaction commits, so a caller never
//! holds a token for state that failed to persist.
//!
//! ERROR HANDLING
//! ==============
//! Validation failures (wrong password, reused password, untrusted device,
//! token mismatch) return before any write begins and never retry. Store
//! failures retry as whole units; an uncommitted transaction rolls back on
//! drop, so a re-run cannot double-insert audit or notification rows.

use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use tracing::{error, info, warn};

use crate::config::AuthConfig;
use crate::crypto::{self, CryptoError, TokenCipher};
use crate::error::AuthError;
use crate::fingerprint::{self, DeviceFingerprint};
use crate::retry::RetryPolicy;
use crate::store::credential::{self, CredentialRow, NewRefreshToken};
use crate::store::profile::{self, SessionEventKind};
use crate::token::{AccessClaims, TokenSigner};

const PASSWORD_CHANGED_SUBJECT: &str = "Your password was changed";
const PASSWORD_CHANGED_BODY: &str =
    "The password on your account was just changed. If this wasn't you, reset it immediately.";
const TEMPORARY_PASSWORD_SUBJECT: &str = "Your temporary password";

// =============================================================================
// OUTCOME TYPES
// =============================================================================

/// Principal facts returned to the caller after login.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PrincipalSummary {
    /// Numeric id, encrypted for transport.
    pub id: String,
    pub email: String,
    /// True when the credential used was issued by a password reset; the
    /// caller must force a rotation before anything else.
    pub temporary_password: bool,
    /// True once locale and region are both set on the profile.
    pub profile_complete: bool,
}

/// Successful login result.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LoginOutcome {
    /// Signed access token.
    pub token: String,
    /// Refresh-token value, encrypted for transport.
    pub refresh_token: String,
    pub principal: PrincipalSummary,
}

/// Successful refresh result. The refresh token rotates on every call, so
/// the caller must replace its stored copy.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RefreshOutcome {
    pub token: String,
    pub refresh_token: String,
}

/// Password-change request.
#[derive(Debug, Clone)]
pub struct PasswordChange {
    /// Current password. Not required in the temporary-credential flow.
    pub current_password: Option<String>,
    pub new_password: String,
    /// True when rotating a temporary credential issued by a reset.
    pub temporary_flow: bool,
}

// =============================================================================
// MANAGER
// =============================================================================

/// Orchestrates credential and session operations over both stores.
pub struct SessionManager {
    pool: PgPool,
    signer: TokenSigner,
    cipher: TokenCipher,
    retry: RetryPolicy,
    refresh_ttl: Duration,
}

impl SessionManager {
    /// Build a manager over the shared pool.
    ///
    /// # Errors
    ///
    /// Returns a crypto error if the configured cipher key is rejected.
    pub fn new(pool: PgPool, config: &AuthConfig) -> Result<Self, CryptoError> {
        Ok(Self {
            signer: TokenSigner::new(config),
            cipher: TokenCipher::new(&config.cipher_key)?,
            retry: RetryPolicy::from_env(),
            refresh_ttl: Duration::days(config.refresh_token_ttl_days),
            pool,
        })
    }

    /// Replace the retry policy. Tests use a zero-delay policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    // =========================================================================
    // LOGIN
    // =========================================================================

    /// Verify an email/password pair and open a session.
    ///
    /// On success the principal's previous refresh token (if any) is
    /// retired and a fresh one is bound to the presented fingerprint.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidCredentials`] for an unknown email or wrong
    /// password; [`AuthError::Store`] when the store stays unreachable
    /// through retries; [`AuthError::Fatal`] for inconsistent state.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        fingerprint: DeviceFingerprint,
    ) -> Result<LoginOutcome, AuthError> {
        let email = normalize_email(email);

        let Some(principal) = profile::find_principal_by_email(&self.pool, &email).await? else {
            warn!("login rejected: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        let Some(active) = credential::find_active_credential(&self.pool, principal.id).await? else {
            error!(principal_id = principal.id, "principal has no active credential");
            return Err(AuthError::Fatal("principal has no active credential".into()));
        };

        if !password_matches(&active, password)? {
            warn!(principal_id = principal.id, "login rejected: password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let token_value = crypto::generate_refresh_token_value();
        let new_token = NewRefreshToken {
            principal_id: principal.id,
            token: token_value.clone(),
            fingerprint,
            expires_at: OffsetDateTime::now_utc() + self.refresh_ttl,
        };

        let session_id = self
            .retry
            .run("auth.login.commit", async || {
                let mut tx = self.pool.begin().await?;
                let session_id = profile::insert_session(tx.as_mut(), principal.id).await?;
                profile::insert_session_event(tx.as_mut(), session_id, SessionEventKind::Login).await?;
                credential::soft_delete_refresh_tokens(tx.as_mut(), principal.id).await?;
                credential::insert_refresh_token(tx.as_mut(), &new_token).await?;
                tx.commit().await?;
                Ok::<i64, AuthError>(session_id)
            })
            .await?;

        let token = self.issue_token(principal.id, session_id)?;
        info!(principal_id = principal.id, session_id, "login succeeded");

        Ok(LoginOutcome {
            token,
            refresh_token: self.cipher.encrypt(&token_value)?,
            principal: PrincipalSummary {
                id: self.cipher.encrypt(&principal.id.to_string())?,
                email: principal.email.clone(),
                temporary_password: active.temporary,
                profile_complete: principal.profile_complete(),
            },
        })
    }

    // =========================================================================
    // UPDATE PASSWORD
    // =========================================================================

    /// Supersede the active credential with a new password.
    ///
    /// The regular flow verifies the current password; the temporary flow
    /// (rotating a reset-issued credential) skips that check but requires
    /// the active credential to actually be temporary. The proposed
    /// password is rejected if it reproduces any historical credential.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidCredentials`] on verification failure,
    /// [`AuthError::PasswordReused`] when history matches,
    /// [`AuthError::Fatal`] when a concurrent change wins the race.
    pub async fn update_password(&self, signed_token: &str, change: PasswordChange) -> Result<(), AuthError> {
        let claims = self.validate_access_token(signed_token)?;
        let (principal_id, session_id) = claims_ids(&claims)?;

        let Some(active) = credential::find_active_credential(&self.pool, principal_id).await? else {
            error!(principal_id, "principal has no active credential");
            return Err(AuthError::Fatal("principal has no active credential".into()));
        };

        if change.temporary_flow {
            if !active.temporary {
                warn!(principal_id, "temporary-flow change rejected: credential is permanent");
                return Err(AuthError::InvalidCredentials);
            }
        } else {
            let supplied = change.current_password.as_deref().unwrap_or_default();
            if !password_matches(&active, supplied)? {
                warn!(principal_id, "password change rejected: current password mismatch");
                return Err(AuthError::InvalidCredentials);
            }
        }

        let history = credential::list_credentials(&self.pool, principal_id).await?;
        if find_reused(&change.new_password, &history)?.is_some() {
            warn!(principal_id, "password change rejected: password reuse");
            return Err(AuthError::PasswordReused);
        }

        let salt = crypto::generate_salt();
        let hash = crypto::hash_password(&change.new_password, &salt)?;

        self.retry
            .run("auth.update_password.commit", async || {
                let mut tx = self.pool.begin().await?;
                // The guard retires exactly the credential we verified. If
                // another change landed in between, zero rows match and we
                // surface instead of clobbering the newer credential.
                if !credential::soft_delete_credential_if_active(tx.as_mut(), active.id).await? {
                    error!(principal_id, credential_id = active.id, "active credential changed concurrently");
                    return Err(AuthError::Fatal("active credential changed concurrently".into()));
                }
                credential::insert_credential(tx.as_mut(), principal_id, &hash, &salt, false).await?;
                profile::insert_session_event(tx.as_mut(), session_id, SessionEventKind::ChangePassword)
                    .await?;
                profile::enqueue_message(
                    tx.as_mut(),
                    principal_id,
                    PASSWORD_CHANGED_SUBJECT,
                    PASSWORD_CHANGED_BODY,
                    OffsetDateTime::now_utc(),
                )
                .await?;
                tx.commit().await?;
                Ok::<(), AuthError>(())
            })
            .await?;

        info!(principal_id, session_id, "password updated");
        Ok(())
    }

    // =========================================================================
    // REFRESH
    // =========================================================================

    /// Exchange an expired access token plus refresh token for a fresh
    /// pair, provided the presenting device is trusted.
    ///
    /// The stored refresh token rotates: the presented value is retired
    /// and the replacement is bound to the presented fingerprint.
    ///
    /// # Errors
    ///
    /// [`AuthError::UntrustedDevice`] below the trust threshold,
    /// [`AuthError::TokenMismatch`] when the presented value does not
    /// decrypt to the stored one, [`AuthError::Fatal`] for an undecodable
    /// bearer token or a principal with nothing to refresh.
    pub async fn refresh(
        &self,
        signed_token: &str,
        encrypted_refresh_token: &str,
        fingerprint: DeviceFingerprint,
    ) -> Result<RefreshOutcome, AuthError> {
        let claims = self.signer.decode_expired_tolerant(signed_token).map_err(|e| {
            warn!(error = %e, "refresh rejected: bearer token undecodable");
            AuthError::Fatal("bearer token rejected".into())
        })?;
        let (principal_id, session_id) = claims_ids(&claims)?;

        let Some(stored) = credential::find_active_refresh_token(&self.pool, principal_id).await? else {
            warn!(principal_id, "refresh rejected: no live refresh token");
            return Err(AuthError::Fatal("no live refresh token".into()));
        };

        let score = fingerprint::trust_score(&stored.fingerprint(), &fingerprint);
        if score < fingerprint::TRUST_THRESHOLD {
            warn!(principal_id, score, "refresh rejected: untrusted device");
            return Err(AuthError::UntrustedDevice { score });
        }

        let presented = match self.cipher.decrypt(encrypted_refresh_token) {
            Ok(value) => value,
            Err(e) => {
                warn!(principal_id, error = %e, "refresh rejected: token undecryptable");
                return Err(AuthError::TokenMismatch);
            }
        };
        if presented != stored.token {
            warn!(principal_id, "refresh rejected: token mismatch");
            return Err(AuthError::TokenMismatch);
        }

        let token_value = crypto::generate_refresh_token_value();
        let replacement = NewRefreshToken {
            principal_id,
            token: token_value.clone(),
            fingerprint,
            expires_at: OffsetDateTime::now_utc() + self.refresh_ttl,
        };

        self.retry
            .run("auth.refresh.rotate", async || {
                let mut tx = self.pool.begin().await?;
                credential::soft_delete_refresh_tokens(tx.as_mut(), principal_id).await?;
                credential::insert_refresh_token(tx.as_mut(), &replacement).await?;
                tx.commit().await?;
                Ok::<(), AuthError>(())
            })
            .await?;

        let token = self.issue_token(principal_id, session_id)?;
        info!(principal_id, session_id, "refresh token rotated");

        Ok(RefreshOutcome { token, refresh_token: self.cipher.encrypt(&token_value)? })
    }

    // =========================================================================
    // RESET PASSWORD
    // =========================================================================

    /// Replace the active credential with a temporary password and queue
    /// it for delivery.
    ///
    /// Always returns `Ok` for unknown emails, so callers cannot enumerate
    /// registered addresses.
    ///
    /// # Errors
    ///
    /// [`AuthError::Store`] when the store stays unreachable through
    /// retries.
    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);

        let Some(principal) = profile::find_principal_by_email(&self.pool, &email).await? else {
            info!("password reset requested for unknown email");
            return Ok(());
        };

        let temporary_password = crypto::generate_temporary_password();
        let salt = crypto::generate_salt();
        let hash = crypto::hash_password(&temporary_password, &salt)?;
        let body = format!(
            "Use this temporary password to sign in and choose a new one: {temporary_password}"
        );

        self.retry
            .run("auth.reset_password.commit", async || {
                let mut tx = self.pool.begin().await?;
                credential::soft_delete_active_credentials(tx.as_mut(), principal.id).await?;
                credential::insert_credential(tx.as_mut(), principal.id, &hash, &salt, true).await?;
                profile::enqueue_message(
                    tx.as_mut(),
                    principal.id,
                    TEMPORARY_PASSWORD_SUBJECT,
                    &body,
                    OffsetDateTime::now_utc(),
                )
                .await?;
                tx.commit().await?;
                Ok::<(), AuthError>(())
            })
            .await?;

        info!(principal_id = principal.id, "temporary credential issued");
        Ok(())
    }

    // =========================================================================
    // LOGOUT + TOKEN VALIDATION
    // =========================================================================

    /// Retire the principal's refresh token and record the logout.
    ///
    /// The access token itself stays valid until its expiry — invalidation
    /// here means the session cannot be refreshed again.
    ///
    /// # Errors
    ///
    /// [`AuthError::Fatal`] for an invalid bearer token, [`AuthError::Store`]
    /// when the store stays unreachable through retries.
    pub async fn logout(&self, signed_token: &str) -> Result<(), AuthError> {
        let claims = self.validate_access_token(signed_token)?;
        let (principal_id, session_id) = claims_ids(&claims)?;

        self.retry
            .run("auth.logout.commit", async || {
                let mut tx = self.pool.begin().await?;
                credential::soft_delete_refresh_tokens(tx.as_mut(), principal_id).await?;
                profile::insert_session_event(tx.as_mut(), session_id, SessionEventKind::Logout).await?;
                tx.commit().await?;
                Ok::<(), AuthError>(())
            })
            .await?;

        info!(principal_id, session_id, "logout retired refresh token");
        Ok(())
    }

    /// Strictly validate a bearer token and return its typed claims.
    ///
    /// # Errors
    ///
    /// [`AuthError::Fatal`] when the token fails signature, expiry,
    /// issuer, or audience checks.
    pub fn validate_access_token(&self, signed_token: &str) -> Result<AccessClaims, AuthError> {
        self.signer.validate(signed_token).map_err(|e| {
            warn!(error = %e, "access token rejected");
            AuthError::Fatal("access token rejected".into())
        })
    }

    fn issue_token(&self, principal_id: i64, session_id: i64) -> Result<String, AuthError> {
        self.signer.issue(principal_id, session_id).map_err(|e| {
            error!(error = %e, principal_id, session_id, "token signing failed");
            AuthError::Fatal("token signing failed".into())
        })
    }
}

// =============================================================================
// PURE HELPERS
// =============================================================================

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Whether `password` reproduces the credential's stored hash under its
/// salt.
fn password_matches(credential: &CredentialRow, password: &str) -> Result<bool, CryptoError> {
    Ok(crypto::hash_password(password, &credential.salt)? == credential.hash)
}

/// First historical credential the candidate password reproduces, if any.
fn find_reused<'a>(
    candidate: &str,
    history: &'a [CredentialRow],
) -> Result<Option<&'a CredentialRow>, CryptoError> {
    for row in history {
        if crypto::hash_password(candidate, &row.salt)? == row.hash {
            return Ok(Some(row));
        }
    }
    Ok(None)
}

fn claims_ids(claims: &AccessClaims) -> Result<(i64, i64), AuthError> {
    let principal_id = claims
        .sub
        .parse::<i64>()
        .map_err(|_| AuthError::Fatal("malformed principal claim".into()))?;
    let session_id = claims
        .sid
        .parse::<i64>()
        .map_err(|_| AuthError::Fatal("malformed session claim".into()))?;
    Ok((principal_id, session_id))
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
