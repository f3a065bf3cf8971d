use crate::config::DatabaseConfig;
use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;

/// Shared Postgres pool for the memory index and the persisted conversations.
#[derive(Clone)]
pub struct DbPool {
    pool: PgPool,
}

impl DbPool {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max_size)
            .acquire_timeout(Duration::from_secs(config.pool_timeout_seconds))
            .connect(&config.url)
            .await
            .context("failed to connect to Postgres")?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .context("Postgres did not answer the probe query")?;

        info!(max_connections = config.pool_max_size, "Database pool ready");
        Ok(Self { pool })
    }

    pub fn inner(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
