//! SQLite-backed store.
//!
//! Split into focused submodules:
//! - `tenants`: tenant lookup and seeding
//! - `sessions`: per-chat pause state and activity timestamps
//! - `messages`: inbound/outbound message rows and chat history
//! - `ledger`: processed-event idempotency records and retention

pub mod ledger;
pub mod messages;
pub mod sessions;
mod tenants;

use chrono::{DateTime, SecondsFormat, Utc};
use hybridflow_core::{config::StoreConfig, error::HybridflowError, shellexpand};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

/// Persistent store backed by SQLite.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open the store, running migrations on first use.
    ///
    /// `:memory:` opens a single-connection in-memory database.
    pub async fn new(config: &StoreConfig) -> Result<Self, HybridflowError> {
        if config.db_path == ":memory:" {
            let pool = Self::memory_pool().await?;
            Self::run_migrations(&pool).await?;
            info!("Store initialized in memory");
            return Ok(Self { pool });
        }

        let db_path = shellexpand(&config.db_path);

        if let Some(parent) = std::path::Path::new(&db_path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| HybridflowError::Store(format!("failed to create data dir: {e}")))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| HybridflowError::Store(format!("invalid db path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .map_err(|e| HybridflowError::Store(format!("failed to connect to sqlite: {e}")))?;

        Self::run_migrations(&pool).await?;

        info!("Store initialized at {db_path}");

        Ok(Self { pool })
    }

    async fn memory_pool() -> Result<SqlitePool, HybridflowError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| HybridflowError::Store(format!("invalid db path: {e}")))?;
        // One connection that never recycles, or the database vanishes.
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .map_err(|e| HybridflowError::Store(format!("failed to open in-memory sqlite: {e}")))
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Cheap liveness probe.
    pub async fn ping(&self) -> Result<(), HybridflowError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| HybridflowError::Store(format!("ping failed: {e}")))?;
        Ok(())
    }

    /// Run SQL migrations, tracking which have already been applied.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), HybridflowError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .execute(pool)
        .await
        .map_err(|e| HybridflowError::Store(format!("failed to create migrations table: {e}")))?;

        let migrations: &[(&str, &str)] = &[
            ("001_init", include_str!("../../migrations/001_init.sql")),
            (
                "002_processed_events",
                include_str!("../../migrations/002_processed_events.sql"),
            ),
        ];

        for (name, sql) in migrations {
            let applied: Option<(String,)> =
                sqlx::query_as("SELECT name FROM _migrations WHERE name = ?")
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| {
                        HybridflowError::Store(format!("failed to check migration {name}: {e}"))
                    })?;

            if applied.is_some() {
                continue;
            }

            sqlx::raw_sql(sql)
                .execute(pool)
                .await
                .map_err(|e| HybridflowError::Store(format!("migration {name} failed: {e}")))?;

            sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
                .bind(name)
                .execute(pool)
                .await
                .map_err(|e| {
                    HybridflowError::Store(format!("failed to record migration {name}: {e}"))
                })?;
        }
        Ok(())
    }
}

/// Timestamps are stored as fixed-width RFC 3339 UTC strings so they sort as text.
pub(crate) fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_ts(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
