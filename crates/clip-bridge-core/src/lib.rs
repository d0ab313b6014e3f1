//! # Clip Bridge Core
//!
//! Shared, I/O-free logic for Clip Bridge: clip and bridge models, the
//! extraction engine, synthesis prompt/reply handling, budget enforcement,
//! renderers, and the clip store abstraction.
//!
//! This crate contains no tokio, sqlx, or HTTP dependencies. The generative
//! model and the persistence layer are reached only through the
//! [`synthesis::Synthesizer`] and [`store::ClipStore`] traits.

pub mod budget;
pub mod extract;
pub mod models;
pub mod render;
pub mod store;
pub mod synthesis;
