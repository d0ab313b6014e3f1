//! In-memory [`ClipStore`] implementation for testing and embedding.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Clips are kept in insertion order; listing sorts by timestamp.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Clip, Project};

use super::{ClipPage, ClipStore, ClipUpdate};

/// In-memory store for tests and single-process embedding.
pub struct InMemoryStore {
    projects: RwLock<HashMap<String, Project>>,
    clips: RwLock<Vec<Clip>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(HashMap::new()),
            clips: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClipStore for InMemoryStore {
    async fn create_project(&self, project: &Project) -> Result<()> {
        let mut projects = self.projects.write().unwrap();
        if projects.contains_key(&project.id) {
            anyhow::bail!("project already exists: {}", project.id);
        }
        projects.insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let projects = self.projects.read().unwrap();
        let mut all: Vec<Project> = projects.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        Ok(self.projects.read().unwrap().get(id).cloned())
    }

    async fn delete_project(&self, id: &str) -> Result<bool> {
        let removed = self.projects.write().unwrap().remove(id).is_some();
        if removed {
            self.clips.write().unwrap().retain(|c| c.project_id.as_deref() != Some(id));
        }
        Ok(removed)
    }

    async fn insert_clip(&self, clip: &Clip) -> Result<()> {
        let mut clips = self.clips.write().unwrap();
        if clips.iter().any(|c| c.id == clip.id) {
            anyhow::bail!("clip already exists: {}", clip.id);
        }
        clips.push(clip.clone());
        Ok(())
    }

    async fn get_clip(&self, id: &str) -> Result<Option<Clip>> {
        Ok(self.clips.read().unwrap().iter().find(|c| c.id == id).cloned())
    }

    async fn update_clip(&self, id: &str, update: &ClipUpdate) -> Result<Option<Clip>> {
        let mut clips = self.clips.write().unwrap();
        match clips.iter_mut().find(|c| c.id == id) {
            Some(clip) => {
                update.apply(clip);
                Ok(Some(clip.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_clip(&self, id: &str) -> Result<bool> {
        let mut clips = self.clips.write().unwrap();
        let before = clips.len();
        clips.retain(|c| c.id != id);
        Ok(clips.len() != before)
    }

    async fn list_clips(&self, project_id: &str) -> Result<Vec<Clip>> {
        let mut clips: Vec<Clip> = self
            .clips
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.project_id.as_deref() == Some(project_id))
            .cloned()
            .collect();
        clips.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(clips)
    }

    async fn list_recent_clips(
        &self,
        project_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<ClipPage> {
        let mut clips: Vec<Clip> = self
            .clips
            .read()
            .unwrap()
            .iter()
            .filter(|c| project_id.map_or(true, |p| c.project_id.as_deref() == Some(p)))
            .cloned()
            .collect();
        clips.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let total = clips.len() as i64;
        let page = clips
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();

        Ok(ClipPage {
            clips: page,
            total,
        })
    }
}
