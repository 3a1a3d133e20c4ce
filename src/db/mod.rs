//! Database initialization — the shared SQLx pool.
//!
//! SYSTEM CONTEXT
//! ==============
//! The profile and credential stores are two schemas inside one
//! `PostgreSQL` database, so a single pool (and a single transaction)
//! covers both. Schema provisioning belongs to the host's migration
//! tooling, not this crate.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::env_parse;

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

fn db_max_connections() -> u32 {
    env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)
}

/// Initialize the `PostgreSQL` connection pool shared by both stores.
///
/// # Errors
///
/// Returns an error if the connection fails.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(db_max_connections())
        .connect(database_url)
        .await
}
