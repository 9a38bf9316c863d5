//! Idempotent schema setup for the analytics database.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create all tables and indexes if they do not exist.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_records (
            id TEXT PRIMARY KEY,
            query TEXT NOT NULL,
            query_norm TEXT NOT NULL,
            caller_id TEXT,
            filters_json TEXT NOT NULL DEFAULT '{}',
            total_found INTEGER NOT NULL DEFAULT 0,
            user_agent TEXT,
            ip TEXT,
            elapsed_ms INTEGER NOT NULL DEFAULT 0,
            success INTEGER NOT NULL,
            error TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_platform_counts (
            search_id TEXT NOT NULL,
            platform TEXT NOT NULL,
            count INTEGER NOT NULL,
            PRIMARY KEY (search_id, platform),
            FOREIGN KEY (search_id) REFERENCES search_records(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_clicks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            search_id TEXT NOT NULL,
            listing_id TEXT NOT NULL,
            clicked_at INTEGER NOT NULL,
            FOREIGN KEY (search_id) REFERENCES search_records(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS course_views (
            listing_id TEXT PRIMARY KEY,
            views INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_search_records_created_at ON search_records(created_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_search_records_caller ON search_records(caller_id, created_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_search_records_query_norm ON search_records(query_norm)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_search_clicks_search_id ON search_clicks(search_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Open the configured database, apply the schema, and close the pool.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}
