//! Connection pool, migrations and liveness checks.

use std::collections::HashSet;
use std::time::Duration;

use reputrack_core::AppConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::error::DbError;

// Relative to this crate's Cargo.toml.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Pool sizing, mirrored from `REPUTRACK_DB_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections.min(config.db_max_connections),
            acquire_timeout: Duration::from_secs(config.db_acquire_timeout_secs),
        }
    }
}

/// Open a pool against `database_url`.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if no connection can be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(database_url)
        .await?;
    tracing::debug!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "database pool connected"
    );
    Ok(pool)
}

/// Apply every embedded migration the database has not recorded yet and
/// return how many that was.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if a migration fails or a recorded
/// migration no longer matches its embedded checksum.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    let recorded = recorded_versions(pool).await;
    let pending = MIGRATOR
        .iter()
        .filter(|m| m.migration_type.is_up_migration() && !recorded.contains(&m.version))
        .count();

    MIGRATOR.run(pool).await?;
    if pending > 0 {
        tracing::info!(applied = pending, "database migrations applied");
    }
    Ok(pending)
}

/// Versions in `_sqlx_migrations`; empty before the first run creates it.
async fn recorded_versions(pool: &PgPool) -> HashSet<i64> {
    sqlx::query_scalar::<_, i64>("SELECT version FROM _sqlx_migrations WHERE success")
        .fetch_all(pool)
        .await
        .map(|versions| versions.into_iter().collect())
        .unwrap_or_default()
}

/// Round-trip a trivial query through the pool.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if no connection is available or the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .map(|_| ())
}

/// [`ping`] with the crate's error type, for health endpoints.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the database is unreachable.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    Ok(ping(pool).await?)
}
