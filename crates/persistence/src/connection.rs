use crate::error::RepositoryError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::env;
use std::time::Duration;

/// Establishes a connection pool to the PostgreSQL instance named by `DATABASE_URL`.
///
/// The pool is shared across every repository and the rest of the process; callers are
/// expected to construct it once during startup and clone the handle from there.
pub async fn connect() -> Result<PgPool, RepositoryError> {
    let database_url = env::var("DATABASE_URL")
        .map_err(|_| RepositoryError::ConnectionConfig("DATABASE_URL must be set".to_string()))?;

    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&database_url)
        .await
        .map_err(RepositoryError::from)
}

/// Runs the crate's embedded migrations against `pool`, bringing the schema up to date.
pub async fn run_migrations(pool: &PgPool) -> Result<(), RepositoryError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
