use crate::config::Config;
use crate::error::AppError;
use deadpool_postgres::tokio_postgres::{Config as PgConfig, NoTls};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use std::time::Duration;

const MIGRATIONS: &[(&str, &str)] = &[
    ("0001_messages", include_str!("../migrations/0001_messages.sql")),
    ("0002_follows", include_str!("../migrations/0002_follows.sql")),
];

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the pool, verify a connection and apply the schema
pub async fn init_pool(config: &Config) -> Result<Pool, AppError> {
    let pg_config: PgConfig = config
        .database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| AppError::Config(format!("DATABASE_URL: {e}")))?;

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
    let pool = Pool::builder(mgr)
        .max_size(config.db_max_connections)
        .build()
        .map_err(|e| AppError::StartServer(format!("db pool: {e}")))?;

    tokio::time::timeout(CONNECT_TIMEOUT, run_migrations(&pool))
        .await
        .map_err(|_| AppError::StartServer("database connect timed out".to_string()))??;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Database pool created and schema applied"
    );
    Ok(pool)
}

async fn run_migrations(pool: &Pool) -> Result<(), AppError> {
    let client = pool.get().await?;
    for (name, sql) in MIGRATIONS {
        client.batch_execute(sql).await?;
        tracing::debug!(migration = name, "migration applied");
    }
    Ok(())
}
