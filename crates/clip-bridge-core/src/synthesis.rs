//! Synthesis adapter: prompt construction and reply parsing.
//!
//! The generative model is reached only through the [`Synthesizer`] trait
//! (text prompt in, text out). [`synthesize`] wraps one call with the
//! fail-soft contract: a transport error, non-JSON reply, or missing key all
//! produce [`fallback_synthesis`] instead of an error.
//!
//! # Prompt
//!
//! Clips are condensed into `"[title]: text"` snippets (500 chars each, at
//! most 8000 chars total) and embedded in a fixed instruction asking for a
//! JSON object with exactly four keys: `situation`, `decisions`,
//! `strategic_context`, `instructions_for_llm`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::extract::truncate_chars;
use crate::models::{Clip, Decision, Situation, Synthesis};

const SNIPPET_CHARS: usize = 500;
const CONDENSED_MAX_CHARS: usize = 8000;
const SNIPPET_SEPARATOR: &str = "\n---\n";
const MAX_DECISIONS: usize = 5;

static FENCE_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^```[A-Za-z0-9_-]*\s*").unwrap());
static FENCE_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*```$").unwrap());

/// A generative-model capability: one prompt in, one text reply out.
///
/// Implementations may fail for any reason (network, auth, rate limits);
/// callers going through [`synthesize`] never see those failures.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Identifier used in logs (e.g. `"gemini-2.5-flash"`).
    fn model_name(&self) -> &str;

    async fn synthesize(&self, prompt: &str) -> Result<String>;
}

/// Concatenate clip snippets for the prompt, staying under the size cap.
///
/// A snippet that would push the running total past the cap is dropped
/// whole, and scanning stops there.
pub fn build_condensed_text(clips: &[Clip]) -> String {
    let mut snippets = Vec::new();
    let mut total = 0usize;

    for clip in clips {
        let title = clip.title_text().unwrap_or("Untitled");
        let snippet = format!(
            "[{}]: {}",
            title,
            truncate_chars(&clip.content_text(), SNIPPET_CHARS)
        );
        let len = snippet.chars().count();
        if total + len > CONDENSED_MAX_CHARS {
            break;
        }
        total += len;
        snippets.push(snippet);
    }

    snippets.join(SNIPPET_SEPARATOR)
}

/// The fixed synthesis instruction sent to the model.
pub fn build_prompt(project_name: &str, clip_count: usize, condensed: &str) -> String {
    format!(
        r#"You are compiling a context bridge so another AI assistant can resume work on a project.

Project: {project_name}
Clips: {clip_count}

Clip excerpts:
{condensed}

Respond with a single JSON object with exactly these four keys:
- "situation": {{"summary": string, "current_status": string, "urgency": "low" | "medium" | "high"}}
- "decisions": array of at most 5 objects {{"decision": string, "reason": string}}
- "strategic_context": string
- "instructions_for_llm": string

Keep the whole response under 400 tokens. Return raw JSON only, without markdown code fences."#
    )
}

/// Remove a surrounding ```` ```lang ... ``` ```` fence if present.
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let start = FENCE_OPEN.find(trimmed).map(|m| m.end()).unwrap_or(0);
    let body = &trimmed[start..];
    let end = FENCE_CLOSE.find(body).map(|m| m.start()).unwrap_or(body.len());
    &body[..end]
}

#[derive(Deserialize)]
struct RawSynthesis {
    situation: Situation,
    decisions: Vec<Decision>,
    strategic_context: String,
    instructions_for_llm: String,
}

/// Parse the model reply into a [`Synthesis`].
///
/// All four keys are required. Extra decisions beyond five are dropped.
pub fn parse_synthesis(reply: &str) -> Result<Synthesis> {
    let body = strip_code_fence(reply);
    let raw: RawSynthesis =
        serde_json::from_str(body).context("synthesis reply is not the expected JSON object")?;

    let mut decisions = raw.decisions;
    decisions.truncate(MAX_DECISIONS);

    Ok(Synthesis {
        situation: raw.situation,
        decisions,
        strategic_context: raw.strategic_context,
        instructions_for_llm: raw.instructions_for_llm,
    })
}

/// Deterministic synthesis used whenever the model cannot be used.
pub fn fallback_synthesis(project_name: &str, clip_count: usize) -> Synthesis {
    Synthesis {
        situation: Situation {
            summary: format!(
                "Project '{}' contains {} captured clips.",
                project_name, clip_count
            ),
            current_status: "Automatic synthesis unavailable; see timeline and key exchanges."
                .to_string(),
            urgency: "unknown".to_string(),
        },
        decisions: Vec::new(),
        strategic_context: format!(
            "Context compiled from {} clips in project '{}'.",
            clip_count, project_name
        ),
        instructions_for_llm: "Review the timeline, entities, and key exchanges to understand \
            the project before continuing the work."
            .to_string(),
    }
}

/// Run one synthesis call, falling back on any failure.
pub async fn synthesize(
    synthesizer: &dyn Synthesizer,
    project_name: &str,
    clips: &[Clip],
) -> Synthesis {
    let condensed = build_condensed_text(clips);
    let prompt = build_prompt(project_name, clips.len(), &condensed);

    let reply = match synthesizer.synthesize(&prompt).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(model = synthesizer.model_name(), error = %e, "synthesis call failed, using fallback");
            return fallback_synthesis(project_name, clips.len());
        }
    };

    match parse_synthesis(&reply) {
        Ok(synthesis) => synthesis,
        Err(e) => {
            tracing::warn!(model = synthesizer.model_name(), error = %e, "unparseable synthesis reply, using fallback");
            fallback_synthesis(project_name, clips.len())
        }
    }
}
