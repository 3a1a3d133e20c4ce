//! Credential store — password history and refresh tokens.
//!
//! DESIGN
//! ======
//! Credentials are append-only history: superseding a password soft-deletes
//! the active row and inserts a new one; history rows are never updated or
//! removed, because the reuse check re-hashes candidates under every
//! historical salt. Refresh tokens follow the same soft-delete discipline.
//! At most one refresh token per principal is live at a time — writers
//! bulk-soft-delete then insert inside one transaction.

use sqlx::{PgConnection, PgPool, Row};
use time::OffsetDateTime;

use crate::fingerprint::DeviceFingerprint;

// =============================================================================
// TYPES
// =============================================================================

/// Mirrors a `credential.credentials` row.
#[derive(Debug, Clone)]
pub struct CredentialRow {
    pub id: i64,
    pub principal_id: i64,
    pub hash: String,
    pub salt: String,
    /// True when issued by a password reset; forces rotation at next login.
    pub temporary: bool,
    pub created_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

/// Mirrors a `credential.refresh_tokens` row.
#[derive(Debug, Clone)]
pub struct RefreshTokenRow {
    pub id: i64,
    pub principal_id: i64,
    pub token: String,
    pub ip_address: String,
    pub user_agent: String,
    pub platform: String,
    pub language: String,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

impl RefreshTokenRow {
    /// The device snapshot captured when this token was issued.
    #[must_use]
    pub fn fingerprint(&self) -> DeviceFingerprint {
        DeviceFingerprint {
            ip_address: self.ip_address.clone(),
            user_agent: self.user_agent.clone(),
            platform: self.platform.clone(),
            language: self.language.clone(),
        }
    }
}

/// Insert payload for a refresh token.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub principal_id: i64,
    pub token: String,
    pub fingerprint: DeviceFingerprint,
    pub expires_at: OffsetDateTime,
}

// =============================================================================
// CREDENTIAL READS
// =============================================================================

/// The principal's single active credential, if any.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn find_active_credential(
    pool: &PgPool,
    principal_id: i64,
) -> Result<Option<CredentialRow>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, principal_id, hash, salt, temporary, created_at, deleted_at
         FROM credential.credentials
         WHERE principal_id = $1 AND deleted_at IS NULL
         ORDER BY created_at DESC, id DESC
         LIMIT 1",
    )
    .bind(principal_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| credential_from_row(&r)))
}

/// Full credential history (active and retired), newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_credentials(pool: &PgPool, principal_id: i64) -> Result<Vec<CredentialRow>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, principal_id, hash, salt, temporary, created_at, deleted_at
         FROM credential.credentials
         WHERE principal_id = $1
         ORDER BY created_at DESC, id DESC",
    )
    .bind(principal_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(credential_from_row).collect())
}

fn credential_from_row(r: &sqlx::postgres::PgRow) -> CredentialRow {
    CredentialRow {
        id: r.get("id"),
        principal_id: r.get("principal_id"),
        hash: r.get("hash"),
        salt: r.get("salt"),
        temporary: r.get("temporary"),
        created_at: r.get("created_at"),
        deleted_at: r.get("deleted_at"),
    }
}

// =============================================================================
// CREDENTIAL WRITES
// =============================================================================

/// Append a credential row; returns the new credential id.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn insert_credential(
    conn: &mut PgConnection,
    principal_id: i64,
    hash: &str,
    salt: &str,
    temporary: bool,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        "INSERT INTO credential.credentials (principal_id, hash, salt, temporary)
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(principal_id)
    .bind(hash)
    .bind(salt)
    .bind(temporary)
    .fetch_one(conn)
    .await?;
    Ok(row.get("id"))
}

/// Retire every active credential for the principal; returns the count.
///
/// # Errors
///
/// Returns a database error if the update fails.
pub async fn soft_delete_active_credentials(
    conn: &mut PgConnection,
    principal_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE credential.credentials SET deleted_at = now()
         WHERE principal_id = $1 AND deleted_at IS NULL",
    )
    .bind(principal_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Retire one specific credential, only if it is still active. Returns
/// whether a row was updated — `false` means another writer got there
/// first.
///
/// # Errors
///
/// Returns a database error if the update fails.
pub async fn soft_delete_credential_if_active(
    conn: &mut PgConnection,
    credential_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE credential.credentials SET deleted_at = now()
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(credential_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

// =============================================================================
// REFRESH TOKEN READS
// =============================================================================

/// The principal's single live (unretired, unexpired) refresh token.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn find_active_refresh_token(
    pool: &PgPool,
    principal_id: i64,
) -> Result<Option<RefreshTokenRow>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, principal_id, token, ip_address, user_agent, platform, language,
                expires_at, created_at
         FROM credential.refresh_tokens
         WHERE principal_id = $1 AND deleted_at IS NULL AND expires_at > now()
         ORDER BY created_at DESC, id DESC
         LIMIT 1",
    )
    .bind(principal_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| RefreshTokenRow {
        id: r.get("id"),
        principal_id: r.get("principal_id"),
        token: r.get("token"),
        ip_address: r.get("ip_address"),
        user_agent: r.get("user_agent"),
        platform: r.get("platform"),
        language: r.get("language"),
        expires_at: r.get("expires_at"),
        created_at: r.get("created_at"),
    }))
}

/// Count of live refresh tokens for the principal. Assertion helper for
/// the live-db suites; product flows read through
/// [`find_active_refresh_token`].
///
/// # Errors
///
/// Returns a database error if the query fails.
#[cfg(all(test, feature = "live-db-tests"))]
pub(crate) async fn count_active_refresh_tokens(
    pool: &PgPool,
    principal_id: i64,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS live FROM credential.refresh_tokens
         WHERE principal_id = $1 AND deleted_at IS NULL AND expires_at > now()",
    )
    .bind(principal_id)
    .fetch_one(pool)
    .await?;
    Ok(row.get("live"))
}

// =============================================================================
// REFRESH TOKEN WRITES
// =============================================================================

/// Retire every live refresh token for the principal; returns the count.
///
/// # Errors
///
/// Returns a database error if the update fails.
pub async fn soft_delete_refresh_tokens(
    conn: &mut PgConnection,
    principal_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE credential.refresh_tokens SET deleted_at = now()
         WHERE principal_id = $1 AND deleted_at IS NULL",
    )
    .bind(principal_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Insert a refresh token with its device snapshot; returns the row id.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn insert_refresh_token(
    conn: &mut PgConnection,
    new_token: &NewRefreshToken,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        "INSERT INTO credential.refresh_tokens
             (principal_id, token, ip_address, user_agent, platform, language, expires_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING id",
    )
    .bind(new_token.principal_id)
    .bind(&new_token.token)
    .bind(&new_token.fingerprint.ip_address)
    .bind(&new_token.fingerprint.user_agent)
    .bind(&new_token.fingerprint.platform)
    .bind(&new_token.fingerprint.language)
    .bind(new_token.expires_at)
    .fetch_one(conn)
    .await?;
    Ok(row.get("id"))
}

#[cfg(test)]
#[path = "credential_test.rs"]
mod tests;
