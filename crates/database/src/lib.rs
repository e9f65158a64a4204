//! Persistence layer for the dropout-risk service.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

mod models;
mod repositories;

pub use models::{
    merge_student, CreateModelArtifact, CreatePrediction, ModelArtifactRecord, Prediction,
    Student, StudentUpsert, TrainingRun,
};
pub use repositories::{
    ModelArtifactRepository, PredictionRepository, StudentRepository, TrainingRunRepository,
};

/// Creates a connection pool to the `SQLite` database.
///
/// # Errors
///
/// Returns an error if the connection to the database fails.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
}

/// Runs all pending migrations.
///
/// # Errors
///
/// Returns an error if running migrations fails.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Creates a single-connection in-memory pool with migrations applied.
///
/// Intended for tests; an in-memory database is per connection, so the
/// pool is capped at one connection.
///
/// # Errors
///
/// Returns an error if the pool cannot be created or migrations fail.
pub async fn create_test_pool() -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}
