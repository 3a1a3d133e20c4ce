//! Profile store — principals, sessions, session events, outbound messages.
//!
//! DESIGN
//! ======
//! Sessions and session events are append-only audit state: a session row
//! per issued token pair, an event row per state-changing operation.
//! Outbound messages are a durable queue — the manager enqueues a row in
//! the same transaction as the state change it announces, and a separate
//! dispatcher process owns delivery.

use sqlx::{PgConnection, PgPool, Row};
use time::OffsetDateTime;

// =============================================================================
// TYPES
// =============================================================================

/// Mirrors a `profile.principals` row.
#[derive(Debug, Clone)]
pub struct PrincipalRow {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub locale: Option<String>,
    pub region: Option<String>,
    pub created_at: OffsetDateTime,
}

impl PrincipalRow {
    /// A profile is complete once locale and region are both set.
    #[must_use]
    pub fn profile_complete(&self) -> bool {
        fn set(field: Option<&str>) -> bool {
            field.is_some_and(|v| !v.trim().is_empty())
        }
        set(self.locale.as_deref()) && set(self.region.as_deref())
    }
}

/// Audit event kinds recorded against a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEventKind {
    Login,
    ChangePassword,
    Logout,
}

impl SessionEventKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::ChangePassword => "change_password",
            Self::Logout => "logout",
        }
    }
}

// =============================================================================
// READS
// =============================================================================

/// Look up a principal by exact (already normalized) email.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn find_principal_by_email(pool: &PgPool, email: &str) -> Result<Option<PrincipalRow>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, email, display_name, locale, region, created_at
         FROM profile.principals
         WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| PrincipalRow {
        id: r.get("id"),
        email: r.get("email"),
        display_name: r.get("display_name"),
        locale: r.get("locale"),
        region: r.get("region"),
        created_at: r.get("created_at"),
    }))
}

// =============================================================================
// WRITES
// =============================================================================

/// Insert a session row; returns the new session id.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn insert_session(conn: &mut PgConnection, principal_id: i64) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("INSERT INTO profile.sessions (principal_id) VALUES ($1) RETURNING id")
        .bind(principal_id)
        .fetch_one(conn)
        .await?;
    Ok(row.get("id"))
}

/// Record an audit event against a session.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn insert_session_event(
    conn: &mut PgConnection,
    session_id: i64,
    kind: SessionEventKind,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO profile.session_events (session_id, kind) VALUES ($1, $2)")
        .bind(session_id)
        .bind(kind.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

/// Enqueue an outbound message for the external dispatcher.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn enqueue_message(
    conn: &mut PgConnection,
    principal_id: i64,
    subject: &str,
    body: &str,
    send_after: OffsetDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO profile.outbound_messages (principal_id, subject, body, send_after)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(principal_id)
    .bind(subject)
    .bind(body)
    .bind(send_after)
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
