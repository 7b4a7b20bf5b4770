use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::Config;

pub async fn connect_pg(cfg: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_max_connections)
        .acquire_timeout(cfg.query_timeout)
        .connect(&cfg.database_url)
        .await?;
    tracing::info!(max_connections = cfg.db_max_connections, "connected to postgres");
    Ok(pool)
}
