//! # Clip Bridge
//!
//! Compiles web clips captured into a project into a "context bridge": a
//! structured document that hands a project's situation, people, decisions,
//! timeline, and key quotes to another AI assistant.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌────────────────┐   ┌──────────┐
//! │  SQLite   │──▶│  Extraction  │──▶│ Synthesis      │──▶│  Budget  │
//! │  clips    │   │  (pure)      │   │ (cached, LLM)  │   │  Render  │
//! └───────────┘   └──────────────┘   └────────────────┘   └────┬─────┘
//!                                                              │
//!                                      ┌───────────────────────┤
//!                                      ▼                       ▼
//!                                 ┌──────────┐           ┌──────────┐
//!                                 │   CLI    │           │   HTTP   │
//!                                 │   (cb)   │           │  (axum)  │
//!                                 └──────────┘           └──────────┘
//! ```
//!
//! The pure pieces (models, extraction, prompt and reply handling, budget,
//! renderers, the store trait) live in `clip-bridge-core`. This crate adds
//! persistence, the Gemini client, the synthesis cache, and the CLI and
//! HTTP surfaces.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`bridge`] | End-to-end bridge compilation |
//! | [`cache`] | Fingerprint-keyed synthesis cache |
//! | [`llm`] | Gemini synthesizer and key resolution |
//! | [`clips`] | Clip and project creation |
//! | [`export`] | Flat text export |
//! | [`sqlite_store`] | SQLite `ClipStore` |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod bridge;
pub mod cache;
pub mod clips;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod llm;
pub mod migrate;
pub mod server;
pub mod sqlite_store;
