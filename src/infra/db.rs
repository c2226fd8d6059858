use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::AppConfig;

/// Postgres pool shared by the listing, moderation and notification services.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Open the pool and make sure at least one connection can be established.
    ///
    /// `DB_IDLE_TIMEOUT_SECONDS=0` keeps idle connections open indefinitely.
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let idle_timeout = match config.db_idle_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(config.db_connect_timeout_seconds))
            .idle_timeout(idle_timeout)
            .max_lifetime(Duration::from_secs(config.db_max_lifetime_seconds))
            .connect(&config.database_url)
            .await
            .context("failed to connect to postgres")?;

        tracing::info!(
            max_connections = config.db_max_connections,
            acquire_timeout_secs = config.db_connect_timeout_seconds,
            idle_timeout_secs = config.db_idle_timeout_seconds,
            max_lifetime_secs = config.db_max_lifetime_seconds,
            "database pool ready"
        );

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Used by `/health`; a failure reports the service as degraded.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("database ping failed")?;
        Ok(())
    }

    /// Wait for checked-out connections to be returned, then close them all.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
