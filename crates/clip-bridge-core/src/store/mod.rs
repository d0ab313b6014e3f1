//! Storage abstraction for clips and projects.
//!
//! The [`ClipStore`] trait is the persistence boundary of the bridge
//! compiler: it only needs [`list_clips`](ClipStore::list_clips) and
//! [`get_project`](ClipStore::get_project). The remaining operations back
//! the CLI and HTTP surfaces.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Clip, Project};

/// Partial update applied by [`ClipStore::update_clip`]. `None` leaves a
/// field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClipUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl ClipUpdate {
    /// Apply this update to a clip in place, keeping `word_count` in sync.
    pub fn apply(&self, clip: &mut Clip) {
        if let Some(title) = &self.title {
            clip.title = Some(title.clone());
        }
        if let Some(text) = &self.text {
            clip.word_count = text.split_whitespace().count() as i64;
            clip.text = Some(text.clone());
        }
        if let Some(project_id) = &self.project_id {
            clip.project_id = Some(project_id.clone());
        }
    }
}

/// One page of clips, newest first, plus the unpaged total.
#[derive(Debug, Clone, Serialize)]
pub struct ClipPage {
    pub clips: Vec<Clip>,
    pub total: i64,
}

/// Abstract clip/project storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_clips`](ClipStore::list_clips) | All clips of a project, oldest first |
/// | [`get_project`](ClipStore::get_project) | Project record, if any |
/// | [`list_recent_clips`](ClipStore::list_recent_clips) | Paged clips, newest first |
#[async_trait]
pub trait ClipStore: Send + Sync {
    async fn create_project(&self, project: &Project) -> Result<()>;

    async fn list_projects(&self) -> Result<Vec<Project>>;

    async fn get_project(&self, id: &str) -> Result<Option<Project>>;

    /// Delete a project and all of its clips. Returns `false` if absent.
    async fn delete_project(&self, id: &str) -> Result<bool>;

    async fn insert_clip(&self, clip: &Clip) -> Result<()>;

    async fn get_clip(&self, id: &str) -> Result<Option<Clip>>;

    /// Apply a partial update, returning the updated clip or `None` if absent.
    async fn update_clip(&self, id: &str, update: &ClipUpdate) -> Result<Option<Clip>>;

    /// Returns `false` if the clip did not exist.
    async fn delete_clip(&self, id: &str) -> Result<bool>;

    /// All clips of a project ordered by timestamp ascending.
    async fn list_clips(&self, project_id: &str) -> Result<Vec<Clip>>;

    /// A page of clips ordered by timestamp descending, optionally filtered
    /// to one project.
    async fn list_recent_clips(
        &self,
        project_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<ClipPage>;
}
