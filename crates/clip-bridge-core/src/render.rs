//! Bridge renderers.
//!
//! | Format | Output |
//! |--------|--------|
//! | [`OutputFormat::Yaml`] | block-style YAML, fixed key order (default) |
//! | [`OutputFormat::Json`] | the bridge structure itself, for programmatic consumers |
//! | [`OutputFormat::Markdown`] | one `##` section per populated key |
//!
//! Key order comes from the field order of [`Bridge`], never from an
//! alphabetical resort.

use anyhow::Result;
use serde::Serialize;
use std::str::FromStr;

use crate::models::Bridge;

/// Output format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
    Markdown,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Yaml => "yaml",
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "markdown",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "yaml" => Ok(OutputFormat::Yaml),
            "json" => Ok(OutputFormat::Json),
            "markdown" => Ok(OutputFormat::Markdown),
            other => anyhow::bail!(
                "invalid format '{}': must be yaml, json, or markdown",
                other
            ),
        }
    }
}

/// A rendered bridge: either text or the structure itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Rendered {
    Text(String),
    Structured(Box<Bridge>),
}

impl Rendered {
    /// Text form for terminals and clipboards. Structured output is
    /// pretty-printed JSON.
    pub fn to_text(&self) -> Result<String> {
        match self {
            Rendered::Text(text) => Ok(text.clone()),
            Rendered::Structured(bridge) => Ok(serde_json::to_string_pretty(bridge)?),
        }
    }
}

/// Serialize a bridge in the requested format.
pub fn render(bridge: Bridge, format: OutputFormat) -> Result<Rendered> {
    match format {
        OutputFormat::Yaml => Ok(Rendered::Text(render_yaml(&bridge)?)),
        OutputFormat::Json => Ok(Rendered::Structured(Box::new(bridge))),
        OutputFormat::Markdown => Ok(Rendered::Text(render_markdown(&bridge))),
    }
}

/// Block-literal text rendering.
pub fn render_yaml(bridge: &Bridge) -> Result<String> {
    Ok(serde_yaml::to_string(bridge)?)
}

/// Section-headed prose rendering. Empty sections are left out entirely.
pub fn render_markdown(bridge: &Bridge) -> String {
    let meta = &bridge.meta;
    let mut lines = vec![
        format!("# Context Bridge: {}", meta.project_name),
        String::new(),
        "## Meta".to_string(),
        format!("- **Sources:** {}", meta.source_platform),
        format!("- **Clips:** {}", meta.total_clips),
        format!("- **Exported:** {}", meta.exported_at),
        format!("- **Bridge version:** {}", meta.bridge_version),
    ];

    let situation = &bridge.situation;
    if !situation.summary.is_empty() || !situation.current_status.is_empty() {
        section(&mut lines, "Situation");
        if !situation.summary.is_empty() {
            lines.push(situation.summary.clone());
            lines.push(String::new());
        }
        lines.push(format!("**Status:** {}", situation.current_status));
        lines.push(format!("**Urgency:** {}", situation.urgency));
    }

    let entities = &bridge.entities;
    if !entities.is_empty() {
        section(&mut lines, "Entities");
        if !entities.people.is_empty() {
            lines.push(format!("**People:** {}", entities.people.join(", ")));
        }
        if !entities.companies.is_empty() {
            lines.push(format!("**Companies:** {}", entities.companies.join(", ")));
        }
    }

    if !bridge.decisions.is_empty() {
        section(&mut lines, "Decisions");
        lines.extend(
            bridge
                .decisions
                .iter()
                .map(|d| format!("- **{}** — {}", d.decision, d.reason)),
        );
    }

    if let Some(timeline) = bridge.timeline.as_ref().filter(|t| !t.is_empty()) {
        section(&mut lines, "Timeline");
        lines.extend(timeline.iter().map(|e| {
            if e.source.is_empty() {
                format!("- **{}** {}", e.date, e.event)
            } else {
                format!("- **{}** {} ({})", e.date, e.event, e.source)
            }
        }));
    }

    if let Some(exchanges) = bridge.key_exchanges.as_ref().filter(|x| !x.is_empty()) {
        section(&mut lines, "Key Exchanges");
        lines.extend(
            exchanges
                .iter()
                .map(|x| format!("> **{}**: {}", x.speaker, x.quote)),
        );
    }

    if let Some(context) = bridge.strategic_context.as_ref().filter(|c| !c.is_empty()) {
        section(&mut lines, "Strategic Context");
        lines.push(context.clone());
    }

    if let Some(instructions) = bridge
        .instructions_for_llm
        .as_ref()
        .filter(|i| !i.is_empty())
    {
        section(&mut lines, "Instructions for LLM");
        lines.push(instructions.clone());
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn section(lines: &mut Vec<String>, heading: &str) {
    lines.push(String::new());
    lines.push(format!("## {}", heading));
}
