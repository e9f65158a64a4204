//! Import command - bulk-loads student records from a CSV file.

use std::path::Path;

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

use crate::ingest::bulk_load_csv;

/// Runs the import command.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a row fails to parse
/// or persist.
pub async fn run(pool: &SqlitePool, file: &Path) -> Result<()> {
    let imported = bulk_load_csv(pool, file).await?;
    info!(imported, path = %file.display(), "Import finished");
    Ok(())
}
