//! Database access for pantry-ai
//!
//! SQLite file `<data folder>/pantry.db` holding the `pantry_items` table.

pub mod items;

pub use items::{ItemRepository, SqliteItemRepository};

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Creates the file and its parent directory if missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create pantry-ai tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> pantry_common::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pantry_items (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            quantity TEXT NOT NULL,
            image_url TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_pantry_items_created ON pantry_items (created_at)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (pantry_items)");

    Ok(())
}
