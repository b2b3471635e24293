//! Relational store for accounts, names, and channel access.
//!
//! Async SQLite access through SQLx. The pool sits behind a lock so the
//! model module can swap in a fresh one after the connection is lost;
//! repositories borrow the [`Database`] and clone the current pool per call.

mod accounts;
mod channels;

pub use accounts::{Account, AccountCriterion, AccountRepository, Name, NameCriterion};
pub use channels::{AccessEntry, AccessLevel, ChannelRepository};

use crate::events::Emitter;
use crate::store::{StoreEvent, StoreFailure, StoreKind};
use parking_lot::RwLock;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),
    #[error("migration error: {0}")]
    Migration(sqlx::migrate::MigrateError),
    #[error("name already registered: {0}")]
    NameRegistered(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl DbError {
    /// True when the error means the pool can no longer reach the database.
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            DbError::Sqlx(sqlx::Error::Io(_))
                | DbError::Sqlx(sqlx::Error::PoolClosed)
                | DbError::Sqlx(sqlx::Error::PoolTimedOut)
                | DbError::Sqlx(sqlx::Error::WorkerCrashed)
        )
    }
}

struct DatabaseInner {
    pool: RwLock<SqlitePool>,
    /// Connection target; for `:memory:` the shared-cache URI, so a
    /// reconnect lands on the same in-memory database.
    target: String,
    memory: bool,
    events: Arc<Emitter<StoreEvent>>,
}

/// Database handle with a replaceable connection pool.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    /// Connection acquire timeout - prevents connection storms from blocking indefinitely.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connect with a private event stream. Used by tests and tools.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        Self::connect(path, Arc::new(Emitter::new())).await
    }

    /// Connect, run migrations, and report failures on `events`.
    pub async fn connect(path: &str, events: Arc<Emitter<StoreEvent>>) -> Result<Self, DbError> {
        let memory = path == ":memory:";
        let target = if memory {
            // One named shared-cache database per call; `file::memory:` collides across tests.
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            format!(
                "sqlite:file:chanserv-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            )
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                warn!(path = %parent.display(), error = %e, "Failed to create database directory");
            }
            path.to_string()
        };

        let pool = Self::open_pool(&target, memory).await?;
        info!(path = %path, "Database connected");

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                pool: RwLock::new(pool),
                target,
                memory,
                events,
            }),
        })
    }

    async fn open_pool(target: &str, memory: bool) -> Result<SqlitePool, DbError> {
        let options = if memory {
            SqliteConnectOptions::from_str(target)?
        } else {
            SqliteConnectOptions::new().filename(target)
        }
        .create_if_missing(true)
        .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(if memory { 1 } else { 5 })
            // An in-memory database lives only while a connection holds it.
            .min_connections(if memory { 1 } else { 0 })
            .acquire_timeout(Self::ACQUIRE_TIMEOUT)
            .idle_timeout(Some(Self::IDLE_TIMEOUT))
            .test_before_acquire(true)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::Migration)?;

        if !memory {
            sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
            sqlx::query("PRAGMA synchronous=NORMAL")
                .execute(&pool)
                .await?;
        }

        Ok(pool)
    }

    /// Current connection pool (cheap clone).
    pub fn pool(&self) -> SqlitePool {
        self.inner.pool.read().clone()
    }

    /// Replace the pool with a fresh connection, then announce readiness.
    pub async fn reconnect(&self) -> Result<(), DbError> {
        let pool = Self::open_pool(&self.inner.target, self.inner.memory).await?;
        let old = std::mem::replace(&mut *self.inner.pool.write(), pool);
        old.close().await;
        info!("Database reconnected");
        self.ready();
        Ok(())
    }

    /// Announce readiness to store listeners.
    pub fn ready(&self) {
        self.inner
            .events
            .emit(&StoreEvent::Ready(StoreKind::Relational));
    }

    /// Pass a result through, reporting failures on the store event stream.
    pub(crate) fn observe<T>(&self, result: Result<T, DbError>) -> Result<T, DbError> {
        if let Err(ref e) = result {
            let failure = if e.is_connection_lost() {
                StoreFailure::ConnectionLost(e.to_string())
            } else {
                StoreFailure::Query(e.to_string())
            };
            self.inner
                .events
                .emit(&StoreEvent::Error(StoreKind::Relational, failure));
        }
        result
    }

    /// Get account repository.
    pub fn accounts(&self) -> AccountRepository<'_> {
        AccountRepository::new(self)
    }

    /// Get channel access repository.
    pub fn channels(&self) -> ChannelRepository<'_> {
        ChannelRepository::new(self)
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        DbError::Sqlx(err)
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err)
    }
}
