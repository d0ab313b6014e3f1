//! Generative-model synthesizers and credential resolution.
//!
//! Implements [`Synthesizer`] for:
//! - **[`DisabledSynthesizer`]**: always fails, so every bridge uses the
//!   deterministic fallback. Selected with `synthesis.provider = "disabled"`.
//! - **[`GeminiSynthesizer`]**: calls `models/{model}:generateContent`.
//!
//! # Credentials
//!
//! A per-request key (the `X-Gemini-Key` header or `--api-key`) takes
//! precedence over the process-wide default read from the environment
//! variable named by `synthesis.api_key_env`. When neither is present the
//! request is rejected with [`BridgeError::MissingApiKey`].
//!
//! # Retry Strategy
//!
//! - HTTP 429 and 5xx → retry with exponential backoff (1s, 2s, 4s, ...)
//! - Other HTTP 4xx → fail immediately
//! - Network errors → retry

use anyhow::{bail, Result};
use async_trait::async_trait;
use clip_bridge_core::synthesis::Synthesizer;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SynthesisConfig;
use crate::error::{BridgeError, BridgeResult};

/// Pick the synthesizer for one request.
pub fn resolve_synthesizer(
    config: &SynthesisConfig,
    api_key_override: Option<&str>,
) -> BridgeResult<Box<dyn Synthesizer>> {
    if !config.is_enabled() {
        return Ok(Box::new(DisabledSynthesizer));
    }

    let api_key = api_key_override
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .or_else(|| {
            std::env::var(&config.api_key_env)
                .ok()
                .filter(|k| !k.trim().is_empty())
        })
        .ok_or_else(|| BridgeError::MissingApiKey {
            env_var: config.api_key_env.clone(),
        })?;

    let synthesizer = GeminiSynthesizer::new(config, api_key).map_err(BridgeError::Internal)?;
    Ok(Box::new(synthesizer))
}

// ============ Disabled ============

/// Synthesizer used when no model is configured.
pub struct DisabledSynthesizer;

#[async_trait]
impl Synthesizer for DisabledSynthesizer {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn synthesize(&self, _prompt: &str) -> Result<String> {
        bail!("Synthesis provider is disabled")
    }
}

// ============ Gemini ============

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Gemini `generateContent` client with retry and backoff.
pub struct GeminiSynthesizer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_retries: u32,
}

impl GeminiSynthesizer {
    pub fn new(config: &SynthesisConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl Synthesizer for GeminiSynthesizer {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn synthesize(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };
        let url = self.endpoint();

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let parsed: GenerateResponse = response.json().await?;
                        return first_candidate_text(parsed);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::warn!(%status, attempt, model = %self.model, "Gemini request failed, retrying");
                        last_err = Some(anyhow::anyhow!("Gemini API error {}: {}", status, body_text));
                        continue;
                    }

                    bail!("Gemini API error {}: {}", status, body_text);
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, model = %self.model, "Gemini request error, retrying");
                    last_err = Some(e.into());
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Gemini synthesis failed after retries")))
    }
}

fn first_candidate_text(resp: GenerateResponse) -> Result<String> {
    resp.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .map(|p| p.text)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("No content in Gemini response"))
}
