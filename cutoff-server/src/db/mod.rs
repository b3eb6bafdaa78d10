//! Database access for cutoff-server
//!
//! A single SQLite database holds the `cutoff_data` table. Schema creation
//! is idempotent and runs at startup and again before every persistence run.

pub mod cutoffs;

use cutoff_common::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Connects to `<data>/cutoff.db`, creating the file when missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    ensure_schema(&pool).await?;

    Ok(pool)
}

/// In-memory database with the schema applied
///
/// Limited to one connection: every connection to `sqlite::memory:` opens a
/// separate, empty database.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    ensure_schema(&pool).await?;
    Ok(pool)
}

/// Create the cutoff table and its indexes if they don't exist
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cutoff_data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            college_id TEXT,
            college_name TEXT NOT NULL,
            branch_id TEXT,
            branch_name TEXT NOT NULL,
            status TEXT,
            category TEXT NOT NULL,
            rank TEXT,
            percentile REAL NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (college_name, branch_name, category, percentile)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_cutoff_percentile ON cutoff_data (percentile)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_cutoff_category ON cutoff_data (category)")
        .execute(pool)
        .await?;

    tracing::debug!("Database schema ensured (cutoff_data)");

    Ok(())
}
