//! Postgres adapter for the catalog repositories.

mod products;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;
use std::time::Duration;

use sqlx::{
    Postgres, Transaction,
    migrate::MigrateError,
    postgres::{PgPool, PgPoolOptions},
};

use crate::application::repos::RepoError;

/// Upper bound on waiting for a pooled connection; exceeding it surfaces as
/// a retryable timeout instead of a hung request.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle implementing both product repository traits.
#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
        sqlx::migrate!("./migrations").run(pool).await
    }

    /// Round-trips a trivial statement; used by `/health`.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        u64::try_from(value)
            .map_err(|_| RepoError::from_persistence(format!("row count {value} is negative")))
    }
}
