//! # uilink — Source-to-UI mapping engine
//!
//! Links elements of a running app's accessibility tree back to the Swift
//! source that produced them, with a confidence score and an evidence chain
//! for every decision.
//!
//! ## Architecture
//!
//! - **[`indexer`]** — Project layout detection and line-oriented Swift recognition
//! - **[`registry`]** — Persisted identifier → location lookup (atomic writes)
//! - **[`matcher`]** — Multi-signal candidate scoring, overrides and ranking
//! - **[`audit`]** — Critical-mapping gate, coverage metrics, unmatched listing
//! - **[`config`]** — Layered JSON configuration (tool → project → local)
//! - **[`snapshot`]** — Accessibility snapshot input
//! - **[`pipeline`]** — End-to-end wiring used by the CLI

pub mod audit;
pub mod config;
pub mod error;
pub mod indexer;
pub mod matcher;
pub mod pattern;
pub mod pipeline;
pub mod registry;
pub mod snapshot;

pub use error::{Error, Result};
