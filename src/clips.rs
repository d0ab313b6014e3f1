//! Clip and project creation.
//!
//! Turns capture requests into stored records: assigns a UUID v4 id, stamps
//! the UTC capture time, derives the domain from the page URL when the
//! caller did not send one, and counts words.
//!
//! The capture extension nests page details under `metadata`
//! (`{title, domain, wordCount}`); top-level `title` and `domain` take
//! precedence when both are present.

use anyhow::{bail, Result};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use uuid::Uuid;

use clip_bridge_core::models::{Clip, MediaType, Project};
use clip_bridge_core::store::ClipStore;

use crate::error::{BridgeError, BridgeResult};

/// Body of `POST /projects` and `cb projects add`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Page details attached to a capture by the browser extension.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClipMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default, rename = "wordCount")]
    pub word_count: Option<i64>,
}

/// Body of `POST /clips` (alias `POST /save`) and `cb clip add`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewClip {
    #[serde(default)]
    pub text: Option<String>,
    pub url: String,
    /// Unassigned when absent or blank.
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub media_type: Option<MediaType>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub screenshot_data: Option<String>,
    #[serde(default)]
    pub metadata: Option<ClipMetadata>,
}

/// Current UTC time in the stored timestamp format.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Host part of `url`, or `None` if it does not parse or has no host.
pub fn domain_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

pub fn new_project(request: NewProject) -> Result<Project> {
    let name = request.name.trim();
    if name.is_empty() {
        bail!("project name must not be empty");
    }
    Ok(Project {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        description: request.description.filter(|d| !d.trim().is_empty()),
    })
}

pub fn new_clip(request: NewClip) -> Result<Clip> {
    if request.url.trim().is_empty() {
        bail!("url must not be empty");
    }
    let metadata = request.metadata.unwrap_or_default();

    let text = request.text.filter(|t| !t.is_empty());
    let word_count = match metadata.word_count {
        Some(n) if n >= 0 => n,
        _ => text
            .as_deref()
            .map(|t| t.split_whitespace().count() as i64)
            .unwrap_or(0),
    };
    let title = non_blank(request.title).or_else(|| non_blank(metadata.title));
    let domain = non_blank(request.domain)
        .or_else(|| non_blank(metadata.domain))
        .or_else(|| domain_of(&request.url));

    Ok(Clip {
        id: Uuid::new_v4().to_string(),
        text,
        url: request.url,
        title,
        domain,
        word_count,
        timestamp: now_timestamp(),
        project_id: non_blank(request.project_id),
        media_type: request.media_type.unwrap_or_default(),
        image_url: request.image_url,
        file_name: request.file_name,
        screenshot_data: request.screenshot_data,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Validate and persist a new clip. A named project must exist.
pub async fn save_clip(store: &dyn ClipStore, request: NewClip) -> BridgeResult<Clip> {
    let clip = new_clip(request).map_err(|e| BridgeError::InvalidRequest(e.to_string()))?;
    if let Some(project_id) = &clip.project_id {
        if store.get_project(project_id).await?.is_none() {
            return Err(BridgeError::NotFound(format!("project {}", project_id)));
        }
    }
    store.insert_clip(&clip).await?;
    tracing::info!(clip_id = %clip.id, project_id = ?clip.project_id, words = clip.word_count, "clip saved");
    Ok(clip)
}

pub async fn save_project(store: &dyn ClipStore, request: NewProject) -> BridgeResult<Project> {
    let project = new_project(request).map_err(|e| BridgeError::InvalidRequest(e.to_string()))?;
    store.create_project(&project).await?;
    tracing::info!(project_id = %project.id, name = %project.name, "project created");
    Ok(project)
}
