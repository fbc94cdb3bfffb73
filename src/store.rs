//! Lazily connected handle to the primary SQLite store.
//!
//! The pool is created on first use and then shared by every clone of the
//! handle. A failed initialization is not cached: the next caller tries again,
//! so a database that comes up after the server does is picked up without a
//! restart.

use std::sync::Arc;
use std::time::Duration;

use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Sqlite, SqlitePool};
use tokio::sync::OnceCell;

use crate::config::{self, DatabaseConfig};
use crate::db;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database is not configured")]
    NotConfigured,
    #[error("database unavailable: {0}")]
    Unavailable(String),
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            other => StoreError::Query(other),
        }
    }
}

impl StoreError {
    /// Unique-constraint violation reported by the database, if any.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::Query(sqlx::Error::Database(db_err)) if db_err.is_unique_violation())
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self, StoreError::Query(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation())
    }
}

struct StoreInner {
    settings: Option<DatabaseConfig>,
    pool: OnceCell<SqlitePool>,
}

#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// A handle for the configured database. An empty URL yields an
    /// unconfigured store that always reports `NotConfigured`.
    pub fn new(settings: &DatabaseConfig) -> Self {
        let settings = if settings.url.trim().is_empty() { None } else { Some(settings.clone()) };
        Self { inner: Arc::new(StoreInner { settings, pool: OnceCell::new() }) }
    }

    pub fn unconfigured() -> Self {
        Self { inner: Arc::new(StoreInner { settings: None, pool: OnceCell::new() }) }
    }

    /// Wraps an already initialized pool (schema must exist).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { inner: Arc::new(StoreInner { settings: None, pool: OnceCell::new_with(Some(pool)) }) }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.settings.is_some() || self.inner.pool.initialized()
    }

    /// The shared pool, connecting and initializing the schema on first use.
    pub async fn pool(&self) -> Result<&SqlitePool, StoreError> {
        if let Some(pool) = self.inner.pool.get() {
            return Ok(pool);
        }
        let settings = self.inner.settings.as_ref().ok_or(StoreError::NotConfigured)?;
        self.inner.pool.get_or_try_init(|| connect(settings)).await
    }

    /// Round-trip check used by the readiness probe.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        sqlx::query("SELECT 1").fetch_one(pool).await?;
        Ok(())
    }
}

async fn connect(settings: &DatabaseConfig) -> Result<SqlitePool, StoreError> {
    let attempts = settings.connect_attempts.max(1);
    let mut last_error = String::new();
    for attempt in 1..=attempts {
        match try_connect(settings).await {
            Ok(pool) => {
                tracing::info!(attempt, "Connected to database");
                return Ok(pool);
            }
            Err(e) => {
                tracing::warn!(attempt, attempts, "Database connection failed: {:#}", e);
                last_error = format!("{:#}", e);
                if attempt < attempts {
                    // Linear back-off between attempts
                    let delay = settings.connect_retry_delay_ms.saturating_mul(u64::from(attempt));
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }
    Err(StoreError::Unavailable(last_error))
}

async fn try_connect(settings: &DatabaseConfig) -> anyhow::Result<SqlitePool> {
    let url = settings.url.trim();
    config::ensure_sqlite_parent_dir(url)?;
    if !Sqlite::database_exists(url).await.unwrap_or(false) {
        tracing::info!("Creating SQLite database at {}", url);
        Sqlite::create_database(url).await?;
    }
    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                let _ = sqlx::query("PRAGMA busy_timeout=10000;").execute(&mut *conn).await;
                // Seller references depend on this, so it is not best-effort
                sqlx::query("PRAGMA foreign_keys=ON;").execute(&mut *conn).await.map(|_| ())
            })
        })
        .connect(url)
        .await?;

    db::init_db(&pool).await?;
    Ok(pool)
}
