//! Bridge compilation pipeline.
//!
//! [`BridgeCompiler::compile`] runs one request end to end:
//!
//! ```text
//! list_clips ─▶ extraction ─▶ fingerprint ─▶ cache / synthesis ─▶ assemble
//!                                                                   │
//!                                  render ◀─ compact | budget ◀─────┘
//! ```
//!
//! Extraction (meta, timeline, entities, key exchanges) is recomputed on
//! every request; only the synthesis is memoized, keyed by the clip-set
//! [`Fingerprint`]. Compact mode strips the four optional sections and
//! skips the budget enforcer entirely.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use clip_bridge_core::budget::BudgetEnforcer;
use clip_bridge_core::extract::{
    build_meta, build_timeline, extract_entities, extract_key_exchanges,
};
use clip_bridge_core::models::{Bridge, Fingerprint};
use clip_bridge_core::render::{render, OutputFormat, Rendered};
use clip_bridge_core::store::ClipStore;
use clip_bridge_core::synthesis::{synthesize, Synthesizer};

use crate::cache::SynthesisCache;
use crate::error::{BridgeError, BridgeResult};

/// Artifact returned for a project with no clips, in every format.
pub const EMPTY_PROJECT_ARTIFACT: &str = "No clips in this project.";

const UNTITLED_PROJECT: &str = "Untitled Project";

/// Per-request knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct BridgeOptions {
    pub format: OutputFormat,
    pub compact: bool,
    /// Token ceiling; ignored in compact mode.
    pub max_tokens: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BridgeOutput {
    pub bridge: Rendered,
    pub clip_count: usize,
}

pub struct BridgeCompiler {
    store: Arc<dyn ClipStore>,
    cache: Arc<SynthesisCache>,
    budget: Arc<dyn BudgetEnforcer>,
}

impl BridgeCompiler {
    pub fn new(
        store: Arc<dyn ClipStore>,
        cache: Arc<SynthesisCache>,
        budget: Arc<dyn BudgetEnforcer>,
    ) -> Self {
        Self {
            store,
            cache,
            budget,
        }
    }

    /// Compile the bridge for `project_id`.
    ///
    /// `resolve_synthesizer` runs only once the project is known to have
    /// clips, so an empty project yields the empty artifact even without
    /// credentials. Synthesis failures never surface here; they degrade to
    /// the fallback synthesis. Resolver, store and render failures are
    /// returned unchanged.
    pub async fn compile<F>(
        &self,
        project_id: &str,
        options: &BridgeOptions,
        resolve_synthesizer: F,
    ) -> BridgeResult<BridgeOutput>
    where
        F: FnOnce() -> BridgeResult<Arc<dyn Synthesizer>>,
    {
        let clips = self.store.list_clips(project_id).await?;
        if clips.is_empty() {
            tracing::info!(project_id, "no clips; returning empty bridge");
            return Ok(BridgeOutput {
                bridge: Rendered::Text(EMPTY_PROJECT_ARTIFACT.to_string()),
                clip_count: 0,
            });
        }
        let synthesizer = resolve_synthesizer()?;

        let project_name = self
            .store
            .get_project(project_id)
            .await?
            .map(|p| p.name)
            .unwrap_or_else(|| UNTITLED_PROJECT.to_string());

        let meta = build_meta(&clips, &project_name, Utc::now());
        let timeline = build_timeline(&clips);
        let entities = extract_entities(&clips);
        let key_exchanges = extract_key_exchanges(&clips);

        let fingerprint = Fingerprint::of(project_id, &clips);
        let synthesis = self
            .cache
            .get_or_compute(&fingerprint, || {
                tracing::info!(
                    fingerprint = %fingerprint,
                    model = synthesizer.model_name(),
                    "synthesizing bridge"
                );
                synthesize(synthesizer.as_ref(), &project_name, &clips)
            })
            .await;

        let mut bridge = Bridge::assemble(meta, entities, timeline, key_exchanges, synthesis);

        if options.compact {
            bridge = bridge.into_compact();
        } else if let Some(max_tokens) = options.max_tokens {
            bridge = self.budget.enforce(bridge, max_tokens);
        }

        let rendered = render(bridge, options.format).map_err(BridgeError::Internal)?;
        tracing::debug!(project_id, clips = clips.len(), format = options.format.as_str(), "bridge compiled");

        Ok(BridgeOutput {
            bridge: rendered,
            clip_count: clips.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use clip_bridge_core::budget::WordCountBudget;
    use clip_bridge_core::models::{Clip, MediaType, Project};
    use crate::cache::CachePolicy;
    use clip_bridge_core::store::memory::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const REPLY: &str = r#"{
        "situation": {"summary": "Launch prep", "current_status": "QA", "urgency": "high"},
        "decisions": [{"decision": "Ship Friday", "reason": "Marketing window"}],
        "strategic_context": "Competitor launches next month.",
        "instructions_for_llm": "Help finish the launch checklist."
    }"#;

    struct Counting {
        calls: AtomicUsize,
        reply: Option<&'static str>,
    }

    impl Counting {
        fn new(reply: Option<&'static str>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                reply,
            }
        }
    }

    #[async_trait]
    impl Synthesizer for Counting {
        fn model_name(&self) -> &str {
            "counting"
        }

        async fn synthesize(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Some(r) => Ok(r.to_string()),
                None => anyhow::bail!("offline"),
            }
        }
    }

    fn given(synth: &Arc<Counting>) -> impl FnOnce() -> BridgeResult<Arc<dyn Synthesizer>> {
        let synth: Arc<dyn Synthesizer> = synth.clone();
        move || Ok(synth)
    }

    #[derive(Default)]
    struct SpyBudget {
        calls: AtomicUsize,
    }

    impl BudgetEnforcer for SpyBudget {
        fn enforce(&self, bridge: Bridge, _max_tokens: usize) -> Bridge {
            self.calls.fetch_add(1, Ordering::SeqCst);
            bridge
        }
    }

    fn clip(id: &str, ts: &str, title: &str, domain: &str) -> Clip {
        Clip {
            id: id.into(),
            text: Some(format!("Notes for {}", title)),
            url: format!("https://{}/x", domain),
            title: Some(title.into()),
            domain: Some(domain.into()),
            word_count: 3,
            timestamp: ts.into(),
            project_id: Some("p1".into()),
            media_type: MediaType::Text,
            image_url: None,
            file_name: None,
            screenshot_data: None,
        }
    }

    async fn launch_store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .create_project(&Project {
                id: "p1".into(),
                name: "Launch".into(),
                description: None,
            })
            .await
            .unwrap();
        for c in [
            clip("b", "2024-01-03T09:00:00", "Ship Decision", "slack.com"),
            clip("a", "2024-01-01T10:00:00", "Kickoff", "github.com"),
            clip("c", "2024-01-02T12:00:00", "Mid Review", "notion.so"),
        ] {
            store.insert_clip(&c).await.unwrap();
        }
        store
    }

    fn compiler(store: Arc<InMemoryStore>, budget: Arc<dyn BudgetEnforcer>) -> BridgeCompiler {
        BridgeCompiler::new(store, Arc::new(SynthesisCache::default()), budget)
    }

    fn structured(output: BridgeOutput) -> Bridge {
        match output.bridge {
            Rendered::Structured(b) => *b,
            Rendered::Text(t) => panic!("expected structured output, got {}", t),
        }
    }

    #[tokio::test]
    async fn test_empty_project_artifact() {
        let store = Arc::new(InMemoryStore::new());
        let synth = Arc::new(Counting::new(Some(REPLY)));
        for format in [OutputFormat::Yaml, OutputFormat::Json, OutputFormat::Markdown] {
            let out = compiler(store.clone(), Arc::new(WordCountBudget))
                .compile(
                    "empty",
                    &BridgeOptions {
                        format,
                        ..Default::default()
                    },
                    given(&synth),
                )
                .await
                .unwrap();
            assert_eq!(out.clip_count, 0);
            assert_eq!(out.bridge, Rendered::Text(EMPTY_PROJECT_ARTIFACT.into()));
        }
        assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_launch_scenario() {
        let c = compiler(launch_store().await, Arc::new(WordCountBudget));
        let synth = Arc::new(Counting::new(Some(REPLY)));
        let out = c
            .compile(
                "p1",
                &BridgeOptions {
                    format: OutputFormat::Json,
                    ..Default::default()
                },
                given(&synth),
            )
            .await
            .unwrap();
        assert_eq!(out.clip_count, 3);

        let bridge = structured(out);
        assert_eq!(bridge.meta.project_name, "Launch");
        assert_eq!(bridge.meta.total_clips, 3);
        assert_eq!(bridge.meta.source_platform, "github.com, notion.so, slack.com");
        let events: Vec<&str> = bridge
            .timeline
            .as_ref()
            .unwrap()
            .iter()
            .map(|e| e.event.as_str())
            .collect();
        assert_eq!(events, vec!["Kickoff", "Mid Review", "Ship Decision"]);
        assert_eq!(bridge.situation.summary, "Launch prep");
        assert_eq!(bridge.decisions.len(), 1);
    }

    #[tokio::test]
    async fn test_synthesis_cached_per_fingerprint() {
        let store = launch_store().await;
        let c = compiler(store.clone(), Arc::new(WordCountBudget));
        let synth = Arc::new(Counting::new(Some(REPLY)));
        let opts = BridgeOptions::default();

        c.compile("p1", &opts, given(&synth)).await.unwrap();
        c.compile("p1", &opts, given(&synth)).await.unwrap();
        assert_eq!(synth.calls.load(Ordering::SeqCst), 1);

        store
            .insert_clip(&clip("d", "2024-01-04T08:00:00", "Launch day", "x.com"))
            .await
            .unwrap();
        c.compile("p1", &opts, given(&synth)).await.unwrap();
        assert_eq!(synth.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_synthesis_uses_fallback() {
        let c = compiler(launch_store().await, Arc::new(WordCountBudget));
        let out = c
            .compile(
                "p1",
                &BridgeOptions {
                    format: OutputFormat::Json,
                    ..Default::default()
                },
                given(&Arc::new(Counting::new(None))),
            )
            .await
            .unwrap();
        let bridge = structured(out);
        assert_eq!(bridge.situation.urgency, "unknown");
        assert!(bridge.decisions.is_empty());
    }

    #[tokio::test]
    async fn test_compact_skips_budget_and_optional_keys() {
        let spy = Arc::new(SpyBudget::default());
        let c = compiler(launch_store().await, spy.clone());
        let out = c
            .compile(
                "p1",
                &BridgeOptions {
                    format: OutputFormat::Yaml,
                    compact: true,
                    max_tokens: Some(10),
                },
                given(&Arc::new(Counting::new(Some(REPLY)))),
            )
            .await
            .unwrap();

        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
        let text = out.bridge.to_text().unwrap();
        for key in ["meta:", "situation:", "entities:", "decisions:"] {
            assert!(text.contains(key), "missing {}", key);
        }
        for key in [
            "timeline:",
            "key_exchanges:",
            "strategic_context:",
            "instructions_for_llm:",
        ] {
            assert!(!text.contains(key), "unexpected {}", key);
        }
    }

    #[tokio::test]
    async fn test_budget_invoked_only_with_ceiling() {
        let spy = Arc::new(SpyBudget::default());
        let c = compiler(launch_store().await, spy.clone());
        let synth = Arc::new(Counting::new(Some(REPLY)));

        c.compile("p1", &BridgeOptions::default(), given(&synth))
            .await
            .unwrap();
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);

        c.compile(
            "p1",
            &BridgeOptions {
                max_tokens: Some(500),
                ..Default::default()
            },
            given(&synth),
        )
        .await
        .unwrap();
        assert_eq!(spy.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_project_record_uses_placeholder_name() {
        let store = Arc::new(InMemoryStore::new());
        let mut orphan = clip("a", "2024-01-01T10:00:00", "Kickoff", "github.com");
        orphan.project_id = Some("ghost".into());
        store.insert_clip(&orphan).await.unwrap();

        let out = compiler(store, Arc::new(WordCountBudget))
            .compile(
                "ghost",
                &BridgeOptions {
                    format: OutputFormat::Json,
                    ..Default::default()
                },
                given(&Arc::new(Counting::new(Some(REPLY)))),
            )
            .await
            .unwrap();
        assert_eq!(structured(out).meta.project_name, UNTITLED_PROJECT);
    }

    #[tokio::test]
    async fn test_empty_project_never_resolves_synthesizer() {
        let out = compiler(Arc::new(InMemoryStore::new()), Arc::new(WordCountBudget))
            .compile("empty", &BridgeOptions::default(), || {
                Err(BridgeError::MissingApiKey {
                    env_var: "GEMINI_API_KEY".into(),
                })
            })
            .await
            .unwrap();
        assert_eq!(out.bridge, Rendered::Text(EMPTY_PROJECT_ARTIFACT.into()));
    }

    #[tokio::test]
    async fn test_resolver_error_surfaces_when_clips_exist() {
        let err = compiler(launch_store().await, Arc::new(WordCountBudget))
            .compile("p1", &BridgeOptions::default(), || {
                Err(BridgeError::MissingApiKey {
                    env_var: "GEMINI_API_KEY".into(),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::MissingApiKey { .. }));
    }

    #[tokio::test]
    async fn test_fallback_is_cached_until_snapshot_or_ttl_changes() {
        let opts = BridgeOptions {
            format: OutputFormat::Json,
            ..Default::default()
        };
        let offline = Arc::new(Counting::new(None));
        let online = Arc::new(Counting::new(Some(REPLY)));

        let c = compiler(launch_store().await, Arc::new(WordCountBudget));
        c.compile("p1", &opts, given(&offline)).await.unwrap();
        let out = c.compile("p1", &opts, given(&online)).await.unwrap();
        assert_eq!(structured(out).situation.urgency, "unknown");
        assert_eq!(online.calls.load(Ordering::SeqCst), 0);

        let expiring = BridgeCompiler::new(
            launch_store().await,
            Arc::new(SynthesisCache::new(CachePolicy {
                max_entries: 0,
                ttl: Some(Duration::ZERO),
            })),
            Arc::new(WordCountBudget),
        );
        expiring.compile("p1", &opts, given(&offline)).await.unwrap();
        let out = expiring.compile("p1", &opts, given(&online)).await.unwrap();
        assert_eq!(structured(out).situation.summary, "Launch prep");
    }
}
