//! Error type for the bridge pipeline.
//!
//! Synthesis failures never appear here: they are absorbed by the fallback
//! in `clip_bridge_core::synthesis`. What remains are hard failures the
//! caller must see.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// No generative-model credential was supplied and no default is set.
    #[error("no API key available: pass one with the request or set {env_var}")]
    MissingApiKey { env_var: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Propagated unchanged from the clip store.
    #[error("storage error: {0:#}")]
    Store(#[from] anyhow::Error),

    #[error("{0:#}")]
    Internal(anyhow::Error),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
