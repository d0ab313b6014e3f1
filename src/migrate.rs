use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes. Idempotent.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Timestamps are RFC 3339 UTC text so lexical order is chronological.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clips (
            id TEXT PRIMARY KEY,
            project_id TEXT,
            text TEXT,
            url TEXT NOT NULL,
            title TEXT,
            domain TEXT,
            word_count INTEGER NOT NULL DEFAULT 0,
            timestamp TEXT NOT NULL,
            media_type TEXT NOT NULL DEFAULT 'text',
            image_url TEXT,
            file_name TEXT,
            screenshot_data TEXT,
            FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_clips_project_ts ON clips(project_id, timestamp)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_clips_timestamp ON clips(timestamp DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
