//! SQLite-backed [`ClipStore`] implementation.
//!
//! Maps each [`ClipStore`] operation onto the `projects` and `clips`
//! tables created by [`crate::migrate`].

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use clip_bridge_core::models::{Clip, MediaType, Project};
use clip_bridge_core::store::{ClipPage, ClipStore, ClipUpdate};

const CLIP_COLUMNS: &str = "id, project_id, text, url, title, domain, word_count, timestamp, \
     media_type, image_url, file_name, screenshot_data";

/// SQLite implementation of the [`ClipStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn clip_from_row(row: &SqliteRow) -> Result<Clip> {
    let media_type: String = row.get("media_type");
    Ok(Clip {
        id: row.get("id"),
        text: row.get("text"),
        url: row.get("url"),
        title: row.get("title"),
        domain: row.get("domain"),
        word_count: row.get("word_count"),
        timestamp: row.get("timestamp"),
        project_id: row.get("project_id"),
        media_type: media_type.parse::<MediaType>()?,
        image_url: row.get("image_url"),
        file_name: row.get("file_name"),
        screenshot_data: row.get("screenshot_data"),
    })
}

fn project_from_row(row: &SqliteRow) -> Project {
    Project {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
    }
}

#[async_trait]
impl ClipStore for SqliteStore {
    async fn create_project(&self, project: &Project) -> Result<()> {
        sqlx::query("INSERT INTO projects (id, name, description) VALUES (?, ?, ?)")
            .bind(&project.id)
            .bind(&project.name)
            .bind(&project.description)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let rows = sqlx::query("SELECT id, name, description FROM projects ORDER BY name, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(project_from_row).collect())
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let row = sqlx::query("SELECT id, name, description FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(project_from_row))
    }

    async fn delete_project(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM clips WHERE project_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_clip(&self, clip: &Clip) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO clips (id, project_id, text, url, title, domain, word_count,
                               timestamp, media_type, image_url, file_name, screenshot_data)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&clip.id)
        .bind(&clip.project_id)
        .bind(&clip.text)
        .bind(&clip.url)
        .bind(&clip.title)
        .bind(&clip.domain)
        .bind(clip.word_count)
        .bind(&clip.timestamp)
        .bind(clip.media_type.as_str())
        .bind(&clip.image_url)
        .bind(&clip.file_name)
        .bind(&clip.screenshot_data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_clip(&self, id: &str) -> Result<Option<Clip>> {
        let row = sqlx::query(&format!("SELECT {} FROM clips WHERE id = ?", CLIP_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(clip_from_row).transpose()
    }

    async fn update_clip(&self, id: &str, update: &ClipUpdate) -> Result<Option<Clip>> {
        let mut clip = match self.get_clip(id).await? {
            Some(clip) => clip,
            None => return Ok(None),
        };
        update.apply(&mut clip);

        sqlx::query(
            "UPDATE clips SET title = ?, text = ?, word_count = ?, project_id = ? WHERE id = ?",
        )
        .bind(&clip.title)
        .bind(&clip.text)
        .bind(clip.word_count)
        .bind(&clip.project_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(Some(clip))
    }

    async fn delete_clip(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM clips WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_clips(&self, project_id: &str) -> Result<Vec<Clip>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM clips WHERE project_id = ? ORDER BY timestamp ASC, rowid ASC",
            CLIP_COLUMNS
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(clip_from_row).collect()
    }

    async fn list_recent_clips(
        &self,
        project_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<ClipPage> {
        let (total, rows) = match project_id {
            Some(pid) => {
                let total: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM clips WHERE project_id = ?")
                        .bind(pid)
                        .fetch_one(&self.pool)
                        .await?;
                let rows = sqlx::query(&format!(
                    "SELECT {} FROM clips WHERE project_id = ? \
                     ORDER BY timestamp DESC LIMIT ? OFFSET ?",
                    CLIP_COLUMNS
                ))
                .bind(pid)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                (total, rows)
            }
            None => {
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clips")
                    .fetch_one(&self.pool)
                    .await?;
                let rows = sqlx::query(&format!(
                    "SELECT {} FROM clips ORDER BY timestamp DESC LIMIT ? OFFSET ?",
                    CLIP_COLUMNS
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                (total, rows)
            }
        };

        let clips = rows.iter().map(clip_from_row).collect::<Result<Vec<_>>>()?;
        Ok(ClipPage { clips, total })
    }
}
