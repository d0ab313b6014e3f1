//! Flat project export.
//!
//! Produces every clip of a project as plain numbered blocks, the
//! "copy everything" alternative to a compiled bridge:
//!
//! ```text
//! --- Clip 1 ---
//! Source: Kickoff (https://github.com/org/repo)
//!
//! Notes from the kickoff meeting.
//! ```
//!
//! Blocks are separated by a blank line. The JSON form is
//! `{project, clip_count, context}`; a project without clips exports the
//! same "No clips in this project." text as an empty bridge.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use clip_bridge_core::models::{Clip, Project};
use clip_bridge_core::store::ClipStore;

use crate::bridge::EMPTY_PROJECT_ARTIFACT;
use crate::error::{BridgeError, BridgeResult};

#[derive(Debug, Serialize)]
pub struct ExportData {
    pub project: Project,
    pub clip_count: usize,
    /// Flat text of every clip.
    pub context: String,
}

/// Render clips as numbered plain-text blocks, oldest first.
pub fn flat_text(clips: &[Clip]) -> String {
    clips
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "--- Clip {} ---\nSource: {} ({})\n\n{}\n",
                i + 1,
                c.title_text().unwrap_or("Untitled"),
                c.url,
                c.content_text()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn build_export(store: &dyn ClipStore, project_id: &str) -> BridgeResult<ExportData> {
    let project = store
        .get_project(project_id)
        .await?
        .ok_or_else(|| BridgeError::NotFound(format!("project {}", project_id)))?;
    let clips = store.list_clips(project_id).await?;
    let context = if clips.is_empty() {
        EMPTY_PROJECT_ARTIFACT.to_string()
    } else {
        flat_text(&clips)
    };
    Ok(ExportData {
        project,
        clip_count: clips.len(),
        context,
    })
}

/// Write the flat text to `output`, or to stdout when `None`.
pub fn write_export(data: &ExportData, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &data.context)?;
            eprintln!(
                "Exported {} clips from '{}' to {}",
                data.clip_count,
                data.project.name,
                path.display()
            );
        }
        None => {
            println!("{}", data.context.trim_end());
        }
    }
    Ok(())
}
