//! PostgreSQL connection management.
//!
//! One pool is shared by every tenant table; tables differ only in the
//! identifier interpolated into their SQL. Each store operation checks out
//! a connection for the duration of one transaction.

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;
use vectorlab_core::StoreError;

/// Create a connection pool to the configured database.
///
/// # Errors
///
/// Fails with [`StoreError::MissingConfig`] when neither `[db] url` nor
/// `$DATABASE_URL` is set, or with the driver error if the server cannot be
/// reached.
pub async fn connect(config: &Config) -> Result<PgPool> {
    let url = config
        .db
        .resolved_url()
        .ok_or(StoreError::MissingConfig("db.url (or DATABASE_URL)"))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db.max_connections)
        .connect(&url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    tracing::debug!(max_connections = config.db.max_connections, "database pool ready");
    Ok(pool)
}
