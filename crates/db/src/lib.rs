use std::time::Duration;

use db_migration::Migrator;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;

pub mod entities;
pub mod events;
pub mod models;
pub mod retry;
pub mod types;
pub mod validation;

pub use sea_orm::{ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait};

pub type DbPool = DatabaseConnection;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Clone)]
pub struct DBService {
    pub pool: DbPool,
}

impl DBService {
    /// Connects to `database_url` and applies pending migrations.
    pub async fn new(database_url: &str) -> Result<DBService, DbErr> {
        let mut options = ConnectOptions::new(database_url.to_string());
        // Each in-memory sqlite connection is a separate database.
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            DEFAULT_MAX_CONNECTIONS
        };
        options
            .max_connections(max_connections)
            .connect_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        let pool = Database::connect(options).await?;
        Migrator::up(&pool, None).await?;
        tracing::info!(max_connections, "database ready");
        Ok(DBService { pool })
    }

    pub async fn new_in_memory() -> Result<DBService, DbErr> {
        Self::new("sqlite::memory:").await
    }
}
