use crate::config::DatabaseConfig;
use crate::error::AppResult;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;

pub type DbPool = DatabaseConnection;

/// 主库（写）与只读副本（统计查询）
#[derive(Clone)]
pub struct DbPools {
    pub primary: DbPool,
    pub replica: DbPool,
}

pub async fn create_pool(url: &str, max_connections: u32) -> AppResult<DbPool> {
    let mut options = ConnectOptions::new(url.to_owned());
    options
        .max_connections(max_connections)
        .connect_timeout(Duration::from_secs(8))
        .sqlx_logging(false);

    let pool = Database::connect(options).await?;
    Ok(pool)
}

pub async fn create_pools(config: &DatabaseConfig) -> AppResult<DbPools> {
    let primary = create_pool(&config.url, config.max_connections).await?;
    let replica = match &config.replica_url {
        Some(url) => {
            log::info!("Using read replica for claim aggregates");
            create_pool(url, config.max_connections).await?
        }
        None => primary.clone(),
    };
    Ok(DbPools { primary, replica })
}

pub async fn run_migrations(pool: &DbPool) -> AppResult<()> {
    Migrator::up(pool, None).await?;
    Ok(())
}
