use std::{str::FromStr, time::Duration};

use sea_orm::{
    SqlxSqliteConnector,
    sqlx::sqlite::{
        SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
    },
};
use sea_orm_migration::MigratorTrait;

pub mod entities;
pub mod models;

pub use sea_orm::{DbErr, SqlErr, TransactionTrait};

pub type DbPool = sea_orm::DatabaseConnection;

#[derive(Clone)]
pub struct DbService {
    pub pool: DbPool,
}

impl DbService {
    /// Connects to the database named by `DATABASE_URL`, falling back to a
    /// local SQLite file, and brings the schema up to date.
    pub async fn new() -> Result<DbService, DbErr> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://orders.sqlite".to_string());
        Self::connect(&database_url).await
    }

    pub async fn connect(database_url: &str) -> Result<DbService, DbErr> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|err| DbErr::Custom(format!("Invalid database URL: {err}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));
        let sqlx_pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|err| DbErr::Custom(format!("Failed to connect to database: {err}")))?;
        let pool = SqlxSqliteConnector::from_sqlx_sqlite_pool(sqlx_pool);
        tracing::debug!("Running database migrations");
        db_migration::Migrator::up(&pool, None).await?;
        Ok(DbService { pool })
    }
}
