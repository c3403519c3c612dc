pub mod sqlite;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite, sqlite::SqlitePool};
use std::sync::Arc;

pub use sqlite::{ChangeEvent, SqliteBackend};

use crate::utils::error::BackendResult;

pub type DbPool = Arc<Pool<Sqlite>>;

pub async fn create_pool(database_url: &str) -> BackendResult<DbPool> {
    let pool = SqlitePool::connect(database_url).await?;
    run_migrations(&pool).await?;
    Ok(Arc::new(pool))
}

/// Private in-memory database. A single connection that never expires keeps
/// the data alive for the pool's lifetime.
pub async fn create_memory_pool() -> BackendResult<DbPool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    run_migrations(&pool).await?;
    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &Pool<Sqlite>) -> BackendResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}
