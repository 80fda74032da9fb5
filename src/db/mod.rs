pub mod sink;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

pub use sink::{PgReadingSink, ReadingSink, SinkError};

/// Destination table, created by `migrations/`.
pub const READINGS_TABLE: &str = "trv_temperatures";

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
#[error("schema bootstrap failed: {0}")]
pub struct BootstrapError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

/// Makes sure the destination table exists. Must be safe to call on every
/// process start.
#[async_trait]
pub trait SchemaBootstrap: Send + Sync {
    async fn bootstrap(&self) -> Result<(), BootstrapError>;
}

/// Applies the embedded migrations. Already-applied versions are skipped, so
/// repeated runs leave the schema untouched.
#[derive(Debug, Clone)]
pub struct PgBootstrap {
    pool: PgPool,
}

impl PgBootstrap {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchemaBootstrap for PgBootstrap {
    async fn bootstrap(&self) -> Result<(), BootstrapError> {
        run_migrations(&self.pool)
            .await
            .map_err(|e| BootstrapError(Box::new(e)))?;
        info!(table = READINGS_TABLE, "Database ready");
        Ok(())
    }
}
