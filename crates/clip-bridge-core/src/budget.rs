//! Token-budget enforcement for assembled bridges.
//!
//! Size is estimated from the block-literal (YAML) rendering: whitespace
//! delimited words × [`TOKENS_PER_WORD`]. This is an approximation, not a
//! tokenizer; the pass thresholds below are tuned against it and must be
//! revisited if a real tokenizer replaces it.
//!
//! # Reduction passes
//!
//! Applied in order, re-estimating after each, stopping once within budget:
//!
//! 1. `key_exchanges` → first 2 entries (earliest kept).
//! 2. `timeline` → last 3 entries (most recent kept).
//! 3. `strategic_context` → first 200 chars + `"..."`.
//!
//! A bridge still over budget after all passes is returned as-is.

use crate::extract::truncate_chars;
use crate::models::Bridge;
use crate::render::render_yaml;

/// Approximate tokens per whitespace-delimited word.
pub const TOKENS_PER_WORD: f64 = 1.3;

const KEEP_EXCHANGES: usize = 2;
const KEEP_TIMELINE: usize = 3;
const STRATEGIC_CONTEXT_CHARS: usize = 200;

/// Shrinks a bridge to fit a token ceiling.
pub trait BudgetEnforcer: Send + Sync {
    fn enforce(&self, bridge: Bridge, max_tokens: usize) -> Bridge;
}

/// The default enforcer: word-count estimate plus three ordered passes.
#[derive(Debug, Default, Clone, Copy)]
pub struct WordCountBudget;

impl BudgetEnforcer for WordCountBudget {
    fn enforce(&self, bridge: Bridge, max_tokens: usize) -> Bridge {
        enforce_budget(bridge, max_tokens)
    }
}

/// Estimated token count of arbitrary text.
pub fn estimate_text_tokens(text: &str) -> usize {
    (text.split_whitespace().count() as f64 * TOKENS_PER_WORD) as usize
}

/// Estimated token count of a bridge in its block-literal rendering.
pub fn estimate_tokens(bridge: &Bridge) -> usize {
    render_yaml(bridge)
        .map(|text| estimate_text_tokens(&text))
        .unwrap_or(0)
}

fn truncate_exchanges(bridge: &mut Bridge) {
    if let Some(exchanges) = bridge.key_exchanges.as_mut() {
        exchanges.truncate(KEEP_EXCHANGES);
    }
}

fn truncate_timeline(bridge: &mut Bridge) {
    if let Some(timeline) = bridge.timeline.as_mut() {
        if timeline.len() > KEEP_TIMELINE {
            timeline.drain(..timeline.len() - KEEP_TIMELINE);
        }
    }
}

fn truncate_strategic_context(bridge: &mut Bridge) {
    if let Some(context) = bridge.strategic_context.as_mut() {
        if context.chars().count() > STRATEGIC_CONTEXT_CHARS {
            *context = format!("{}...", truncate_chars(context, STRATEGIC_CONTEXT_CHARS));
        }
    }
}

const PASSES: [fn(&mut Bridge); 3] = [
    truncate_exchanges,
    truncate_timeline,
    truncate_strategic_context,
];

/// Apply the reduction passes until the estimate fits `max_tokens`.
pub fn enforce_budget(mut bridge: Bridge, max_tokens: usize) -> Bridge {
    for pass in PASSES {
        if estimate_tokens(&bridge) <= max_tokens {
            return bridge;
        }
        pass(&mut bridge);
    }
    bridge
}
