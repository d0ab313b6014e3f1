//! CLI command implementations.
//!
//! Each `run_*` function opens the database from the config, performs one
//! operation, and prints its result to stdout. Diagnostics go to stderr.

use anyhow::{bail, Result};
use std::path::Path;
use std::sync::Arc;

use clip_bridge_core::budget::WordCountBudget;
use clip_bridge_core::models::{MediaType, Project};
use clip_bridge_core::render::OutputFormat;
use clip_bridge_core::store::ClipStore;

use crate::bridge::{BridgeCompiler, BridgeOptions};
use crate::cache::SynthesisCache;
use crate::clips::{save_clip, save_project, NewClip, NewProject};
use crate::config::Config;
use crate::db;
use crate::export::{build_export, write_export};
use crate::llm::resolve_synthesizer;
use crate::sqlite_store::SqliteStore;

async fn open_store(config: &Config) -> Result<SqliteStore> {
    let pool = db::connect(config).await?;
    Ok(SqliteStore::new(pool))
}

/// Find a project by id, falling back to an exact name match.
async fn resolve_project(store: &dyn ClipStore, key: &str) -> Result<Project> {
    if let Some(project) = store.get_project(key).await? {
        return Ok(project);
    }
    let mut matches: Vec<Project> = store
        .list_projects()
        .await?
        .into_iter()
        .filter(|p| p.name == key)
        .collect();
    match matches.len() {
        0 => bail!("No project with id or name '{}'", key),
        1 => Ok(matches.remove(0)),
        n => bail!(
            "{} projects are named '{}'; pass the project id instead",
            n,
            key
        ),
    }
}

pub async fn run_projects_list(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let projects = store.list_projects().await?;

    if projects.is_empty() {
        println!("No projects.");
        return Ok(());
    }
    for p in projects {
        match p.description.as_deref() {
            Some(desc) => println!("{}  {}  ({})", p.id, p.name, desc),
            None => println!("{}  {}", p.id, p.name),
        }
    }
    Ok(())
}

pub async fn run_projects_add(
    config: &Config,
    name: &str,
    description: Option<String>,
) -> Result<()> {
    let store = open_store(config).await?;
    let project = save_project(
        &store,
        NewProject {
            name: name.to_string(),
            description,
        },
    )
    .await?;
    println!("{}", project.id);
    Ok(())
}

pub async fn run_clip_add(
    config: &Config,
    project: &str,
    url: String,
    title: Option<String>,
    text: Option<String>,
    domain: Option<String>,
    media_type: Option<String>,
) -> Result<()> {
    let store = open_store(config).await?;
    let project = resolve_project(&store, project).await?;
    let media_type = media_type
        .as_deref()
        .map(str::parse::<MediaType>)
        .transpose()?;

    let clip = save_clip(
        &store,
        NewClip {
            text,
            url,
            project_id: Some(project.id),
            title,
            domain,
            media_type,
            ..Default::default()
        },
    )
    .await?;
    println!("{}", clip.id);
    Ok(())
}

pub async fn run_clips(
    config: &Config,
    project: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<()> {
    if limit <= 0 {
        bail!("--limit must be > 0");
    }
    if offset < 0 {
        bail!("--offset must be >= 0");
    }

    let store = open_store(config).await?;
    let project_id = match project {
        Some(key) => Some(resolve_project(&store, key).await?.id),
        None => None,
    };
    let page = store
        .list_recent_clips(project_id.as_deref(), limit, offset)
        .await?;

    if page.clips.is_empty() {
        println!("No clips.");
        return Ok(());
    }
    for clip in &page.clips {
        println!(
            "{}  {}  [{}] {}",
            clip.timestamp,
            clip.id,
            clip.media_type,
            clip.title_text().unwrap_or(&clip.url)
        );
    }
    eprintln!(
        "Showing {}-{} of {} clips",
        offset + 1,
        offset + page.clips.len() as i64,
        page.total
    );
    Ok(())
}

pub async fn run_bridge(
    config: &Config,
    project: &str,
    format: Option<&str>,
    compact: bool,
    max_tokens: Option<usize>,
    api_key: Option<&str>,
) -> Result<()> {
    let format = match format {
        Some(f) => f.parse::<OutputFormat>()?,
        None => config.bridge.format()?,
    };
    if max_tokens == Some(0) {
        bail!("--max-tokens must be > 0");
    }

    let store: Arc<SqliteStore> = Arc::new(open_store(config).await?);
    let project = resolve_project(store.as_ref(), project).await?;

    let compiler = BridgeCompiler::new(
        store,
        Arc::new(SynthesisCache::new(config.cache.policy())),
        Arc::new(WordCountBudget),
    );
    let options = BridgeOptions {
        format,
        compact,
        max_tokens: max_tokens.or(config.bridge.max_tokens),
    };
    let output = compiler
        .compile(&project.id, &options, || {
            resolve_synthesizer(&config.synthesis, api_key).map(Arc::from)
        })
        .await?;

    println!("{}", output.bridge.to_text()?.trim_end());
    eprintln!(
        "Compiled bridge for '{}' from {} clips",
        project.name, output.clip_count
    );
    Ok(())
}

pub async fn run_export(config: &Config, project: &str, output: Option<&Path>) -> Result<()> {
    let store = open_store(config).await?;
    let project = resolve_project(&store, project).await?;
    let data = build_export(&store, &project.id).await?;
    write_export(&data, output)
}
