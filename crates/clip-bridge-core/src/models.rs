//! Core data models: clips, projects, and the compiled bridge document.
//!
//! The [`Bridge`] struct declares its fields in the fixed top-level order
//! every renderer must preserve (`meta, situation, entities, decisions,
//! timeline, key_exchanges, strategic_context, instructions_for_llm`), so
//! serde emits keys in that order without a resort.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of content a clip captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Text,
    Image,
    Screenshot,
    File,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Text => "text",
            MediaType::Image => "image",
            MediaType::Screenshot => "screenshot",
            MediaType::File => "file",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "text" => Ok(MediaType::Text),
            "image" => Ok(MediaType::Image),
            "screenshot" => Ok(MediaType::Screenshot),
            "file" => Ok(MediaType::File),
            other => anyhow::bail!(
                "invalid media_type '{}': must be text, image, screenshot, or file",
                other
            ),
        }
    }
}

/// A single captured snippet attributed to a source URL and, usually, a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub word_count: i64,
    /// ISO-8601 capture time. Lexical order equals chronological order.
    pub timestamp: String,
    /// `None` for clips captured without a project.
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub media_type: MediaType,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub screenshot_data: Option<String>,
}

impl Clip {
    /// Text used for extraction and prompting.
    ///
    /// Falls back from the body text to a file label, then an image/source
    /// label, then a screenshot label, so non-text media still contribute a
    /// readable line.
    pub fn content_text(&self) -> String {
        if let Some(text) = non_blank(self.text.as_deref()) {
            return text.to_string();
        }
        if let Some(name) = non_blank(self.file_name.as_deref()) {
            return format!("[File] {}", name);
        }
        if self.image_url.is_some() || self.media_type == MediaType::Image {
            return format!("[Image] from {}", self.url);
        }
        if self.screenshot_data.is_some() || self.media_type == MediaType::Screenshot {
            let label = non_blank(self.title.as_deref()).unwrap_or(&self.url);
            return format!("[Screenshot] {}", label);
        }
        String::new()
    }

    /// The clip title, if present and not blank.
    pub fn title_text(&self) -> Option<&str> {
        non_blank(self.title.as_deref())
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}

/// A named collection of clips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Snapshot identity of a project's clip set, used as the synthesis cache key.
///
/// Any insertion or deletion that moves the latest timestamp or the count
/// produces a new fingerprint; stale entries are simply never looked up again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub project_id: String,
    pub latest_timestamp: String,
    pub clip_count: usize,
}

impl Fingerprint {
    pub fn of(project_id: &str, clips: &[Clip]) -> Self {
        let latest_timestamp = clips
            .iter()
            .map(|c| c.timestamp.as_str())
            .max()
            .unwrap_or("")
            .to_string();
        Self {
            project_id: project_id.to_string(),
            latest_timestamp,
            clip_count: clips.len(),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}#{}",
            self.project_id, self.latest_timestamp, self.clip_count
        )
    }
}

// ============ Bridge document ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeMeta {
    pub source_platform: String,
    pub exported_at: String,
    pub total_clips: usize,
    pub project_name: String,
    pub bridge_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Situation {
    pub summary: String,
    pub current_status: String,
    pub urgency: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Entities {
    pub people: Vec<String>,
    pub companies: Vec<String>,
}

impl Entities {
    pub fn is_empty(&self) -> bool {
        self.people.is_empty() && self.companies.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub date: String,
    pub event: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyExchange {
    pub speaker: String,
    pub quote: String,
}

/// The generative part of a bridge: the only sub-tree that is cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    pub situation: Situation,
    pub decisions: Vec<Decision>,
    pub strategic_context: String,
    pub instructions_for_llm: String,
}

/// The compiled context document handed to another assistant.
///
/// Optional sections are `None` only after compact mode removed them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bridge {
    pub meta: BridgeMeta,
    pub situation: Situation,
    pub entities: Entities,
    pub decisions: Vec<Decision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Vec<TimelineEvent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_exchanges: Option<Vec<KeyExchange>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategic_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions_for_llm: Option<String>,
}

impl Bridge {
    /// Merge the deterministic extraction outputs with a synthesis result.
    pub fn assemble(
        meta: BridgeMeta,
        entities: Entities,
        timeline: Vec<TimelineEvent>,
        key_exchanges: Vec<KeyExchange>,
        synthesis: Synthesis,
    ) -> Self {
        Self {
            meta,
            situation: synthesis.situation,
            entities,
            decisions: synthesis.decisions,
            timeline: Some(timeline),
            key_exchanges: Some(key_exchanges),
            strategic_context: Some(synthesis.strategic_context),
            instructions_for_llm: Some(synthesis.instructions_for_llm),
        }
    }

    /// Keep only `meta, situation, entities, decisions`.
    pub fn into_compact(mut self) -> Self {
        self.timeline = None;
        self.key_exchanges = None;
        self.strategic_context = None;
        self.instructions_for_llm = None;
        self
    }
}
